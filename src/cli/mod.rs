pub mod controller;
pub mod daemon_path;
pub mod process;
pub mod view;

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use controller::Controller;
use daemon_path::to_daemon_path;
use process::{kill_previous_servers, restart_server};
use tokio_util::sync::CancellationToken;
use tracing::{level_filters::LevelFilter, warn};
use view::{TerminalView, View};

use crate::{
    config::Config,
    control::client::ControlClient,
    daemon::{
        service::TimerService,
        shutdown::detect_shutdown,
        start_daemon,
        storage::kv_store::{JsonFileStore, KeyValueStore},
        STATE_FILE,
    },
    timer::snapshot::TimerSnapshot,
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "fourhours", version, long_about = None)]
#[command(about = "Work four hours every day. No excuses.", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print without colors")]
    plain: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(about = "Run a daemon directly in current console. Used for debugging")]
    Serve {},
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Start counting down work time")]
    Work {},
    #[command(about = "Stop working and start counting procrastination")]
    Procrastinate {},
    #[command(about = "Reset both timers to the start of a day")]
    Reset {},
    #[command(about = "Show current timers")]
    Status {},
    #[command(about = "Show timers every second while they are counting")]
    Watch {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    let prefix = match args.commands {
        Commands::Serve {} => DAEMON_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    let daemon = to_daemon_path(env::current_exe()?);
    let view = TerminalView::new(!args.plain);

    match args.commands {
        Commands::Init {} => {
            restart_server(&daemon, &app_dir)?;
            println!("Started daemon");
            Ok(())
        }
        Commands::Stop {} => {
            let killed = kill_previous_servers(&daemon)?;
            println!("Stopped {killed} daemon(s)");
            Ok(())
        }
        Commands::Serve {} => start_daemon(app_dir).await,
        Commands::Work {} => connect(&app_dir, view).await?.work().await.map(|_| ()),
        Commands::Procrastinate {} => connect(&app_dir, view)
            .await?
            .procrastinate()
            .await
            .map(|_| ()),
        Commands::Reset {} => connect(&app_dir, view).await?.reset().await.map(|_| ()),
        Commands::Status {} => status(&app_dir, view).await,
        Commands::Watch {} => {
            let shutdown = CancellationToken::new();
            let mut controller = connect(&app_dir, view).await?;
            let (_, watched) = tokio::join!(
                detect_shutdown(shutdown.clone()),
                async {
                    let result = controller.watch(shutdown.clone()).await;
                    shutdown.cancel();
                    result
                },
            );
            watched.map(|_| ())
        }
    }
}

async fn connect<V: View>(
    app_dir: &Path,
    view: V,
) -> Result<Controller<ControlClient, V>> {
    let config = Config::load(app_dir).await?;
    let client = ControlClient::connect(config.control_port).await?;
    Ok(Controller::new(client, view, Box::new(DefaultClock)))
}

async fn status<V: View>(app_dir: &Path, view: V) -> Result<()> {
    let config = Config::load(app_dir).await?;
    let store = JsonFileStore::new(app_dir.join(STATE_FILE))?;
    status_or_stored(&config, store, view, Box::new(DefaultClock)).await?;
    Ok(())
}

/// Asks the daemon, and falls back to reading `store` when it isn't running. The fallback never
/// writes, so a daemon started later still recovers the same state.
async fn status_or_stored<S: KeyValueStore, V: View>(
    config: &Config,
    store: S,
    mut view: V,
    clock: Box<dyn Clock>,
) -> Result<TimerSnapshot> {
    match ControlClient::connect(config.control_port).await {
        Ok(client) => Controller::new(client, view, clock).status().await,
        Err(e) => {
            warn!("Reading stored state directly: {e:#}");
            println!("Daemon is not running, timers are not counting.");
            let service = TimerService::new(store, clock, config.work_budget_secs);
            let snapshot = service.peek().await?;
            view.render(&snapshot);
            Ok(snapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, sync::Arc};

    use anyhow::Result;
    use chrono::Duration as ChronoDuration;
    use serde_json::{json, Map, Value};
    use tokio::net::TcpListener;

    use crate::{
        config::Config,
        daemon::storage::kv_store::{KeyValueStore, MemoryStore},
        utils::{
            clock::{testing::TestClock, Clock},
            logging::TEST_LOGGING,
        },
    };

    use super::{status_or_stored, view::MockView};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected an object"),
        }
    }

    /// A port that was just free, so nothing answers on it.
    async fn unused_port() -> Result<u16> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        Ok(listener.local_addr()?.port())
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reads_store_without_daemon() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::new();
        let yesterday = clock.time() - ChronoDuration::days(1);
        let stored = object(json!({
            "timeLeft": 40,
            "isRunning": false,
            "firstStartTime": yesterday.timestamp(),
            "totalStopTime": 500,
            "lastStopTime": yesterday.timestamp(),
        }));
        let store = Arc::new(MemoryStore::new(stored.clone()));
        let config = Config {
            work_budget_secs: 100,
            control_port: unused_port().await?,
        };

        let mut view = MockView::new();
        view.expect_render()
            .withf(|snapshot| {
                snapshot.time_left == 40
                    && snapshot.first_start_time.is_none()
                    && snapshot.total_stop_time == 0
                    && snapshot.last_stop_time.is_none()
            })
            .times(1)
            .returning(|_| ());

        let snapshot = status_or_stored(&config, store.clone(), view, Box::new(clock)).await?;
        assert_eq!(snapshot.work_budget, 100);
        assert!(!snapshot.is_running);

        let keys: Vec<&str> = stored.keys().map(String::as_str).collect();
        assert_eq!(store.get(&keys).await?, stored);
        Ok(())
    }
}
