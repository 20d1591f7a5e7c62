use std::{net::Ipv4Addr, path::PathBuf};

use anyhow::Result;
use counter::{Command, CounterTask};
use service::TimerService;
use storage::kv_store::{JsonFileStore, KeyValueStore};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::Config,
    control::server,
    utils::clock::{Clock, DefaultClock},
};

pub mod alarms;
pub mod args;
pub mod counter;
pub mod service;
pub mod shutdown;
pub mod storage;

/// File inside the application directory that holds timer state.
pub const STATE_FILE: &str = "state.json";

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let config = Config::load(&dir).await?;
    info!("Starting daemon in {dir:?} with {config:?}");

    let store = JsonFileStore::new(dir.join(STATE_FILE))?;
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, config.control_port)).await?;

    let shutdown_token = CancellationToken::new();
    let (sender, receiver) = mpsc::channel::<Command>(10);

    let counter = create_counter(
        store,
        receiver,
        &shutdown_token,
        DefaultClock,
        config.work_budget_secs,
    );

    let (_, counter_result, server_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        async {
            // Without the counter there is nothing to serve, this also ends `detect_shutdown`.
            let result = counter.run().await;
            shutdown_token.cancel();
            result
        },
        server::serve(listener, sender, shutdown_token.clone()),
    );

    if let Err(counter_result) = counter_result {
        error!("Counter task got an error {:?}", counter_result);
    }

    if let Err(server_result) = server_result {
        error!("Control server got an error {:?}", server_result);
    }

    Ok(())
}

fn create_counter<S: KeyValueStore>(
    store: S,
    receiver: mpsc::Receiver<Command>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
    work_budget: u64,
) -> CounterTask<S> {
    let service = TimerService::new(store, Box::new(clock), work_budget);
    CounterTask::new(service, receiver, shutdown_token.clone())
}
