use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use fs4::tokio::AsyncFileExt;
use serde_json::{Map, Value};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

/// Interface for abstracting the persistent key-value store.
pub trait KeyValueStore {
    /// Retrieves the requested keys. Keys that were never set are absent from the result.
    fn get(&self, keys: &[&str]) -> impl Future<Output = Result<Map<String, Value>>>;

    /// Merges `values` into the store. Keys that aren't mentioned keep their values.
    fn set(&self, values: Map<String, Value>) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, keys: &[&str]) -> impl Future<Output = Result<Map<String, Value>>> {
        self.deref().get(keys)
    }

    fn set(&self, values: Map<String, Value>) -> impl Future<Output = Result<()>> {
        self.deref().set(values)
    }
}

/// The main realization of [KeyValueStore]. The whole mapping lives in one json file, which is
/// locked while it's being read or rewritten.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => Err(e)?,
        };
        file.lock_shared()?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        read?;

        Ok(parse_mapping(&self.path, &content))
    }

    async fn write_merged(file: &mut File, path: &Path, values: Map<String, Value>) -> Result<()> {
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        let mut mapping = parse_mapping(path, &content);
        mapping.extend(values);

        let buffer = serde_json::to_vec(&Value::Object(mapping))?;
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let mut mapping = self.read_all().await?;
        mapping.retain(|key, _| keys.contains(&key.as_str()));
        Ok(mapping)
    }

    async fn set(&self, values: Map<String, Value>) -> Result<()> {
        debug!("Writing {values:?} into {:?}", self.path);
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::write_merged(&mut file, &self.path, values).await;
        file.unlock_async().await?;
        result
    }
}

/// An empty or corrupted file counts as an empty store. Corruption might happen after a
/// shutdown cut off a write.
fn parse_mapping(path: &Path, content: &str) -> Map<String, Value> {
    if content.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(mapping)) => mapping,
        Ok(other) => {
            warn!("Store {path:?} doesn't contain an object: {other}");
            Map::new()
        }
        Err(e) => {
            warn!("Store {path:?} contains illegal json: {e}");
            Map::new()
        }
    }
}

/// In-memory store. State is lost together with the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow!("Memory store was poisoned"))?;
        Ok(values
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn set(&self, values: Map<String, Value>) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| anyhow!("Memory store was poisoned"))?
            .extend(values);
        Ok(())
    }
}
