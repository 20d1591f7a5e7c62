use std::{io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timer::DEFAULT_WORK_BUDGET_SECS;

pub const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_CONTROL_PORT: u16 = 47_515;

/// Optional `config.json` in the application directory. Every field has a default, so the file
/// may mention only what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Work countdown for a fresh day or after a reset.
    pub work_budget_secs: u64,
    /// Loopback port the daemon listens on for control messages.
    pub control_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_budget_secs: DEFAULT_WORK_BUDGET_SECS,
            control_port: DEFAULT_CONTROL_PORT,
        }
    }
}

impl Config {
    pub async fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {path:?}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read config {path:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{Config, CONFIG_FILE, DEFAULT_CONTROL_PORT};

    #[tokio::test]
    async fn test_missing_config_is_default() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(Config::load(dir.path()).await?, Config::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_config() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "workBudgetSecs": 100 }"#)?;

        let config = Config::load(dir.path()).await?;
        assert_eq!(config.work_budget_secs, 100);
        assert_eq!(config.control_port, DEFAULT_CONTROL_PORT);
        Ok(())
    }

    #[tokio::test]
    async fn test_broken_config_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE), "workBudgetSecs = 100")?;

        assert!(Config::load(dir.path()).await.is_err());
        Ok(())
    }
}
