use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    control::{ControlMessage, ControlTransport},
    timer::snapshot::TimerSnapshot,
    utils::clock::Clock,
};

use super::view::View;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// User facing side of the timer. Actions are sent to the counter, whatever state comes back is
/// rendered. The controller never computes timer values itself.
pub struct Controller<T: ControlTransport, V: View> {
    transport: T,
    view: V,
    clock: Box<dyn Clock>,
}

impl<T: ControlTransport, V: View> Controller<T, V> {
    pub fn new(transport: T, view: V, clock: Box<dyn Clock>) -> Self {
        Self {
            transport,
            view,
            clock,
        }
    }

    async fn act(&mut self, message: ControlMessage) -> Result<TimerSnapshot> {
        let snapshot = self.transport.request(message).await?;
        debug!("{message:?} resulted in {snapshot:?}");
        self.view.render(&snapshot);
        Ok(snapshot)
    }

    /// Starts the work countdown.
    pub async fn work(&mut self) -> Result<TimerSnapshot> {
        self.act(ControlMessage::StartTimer).await
    }

    /// Stops working and starts counting procrastination.
    pub async fn procrastinate(&mut self) -> Result<TimerSnapshot> {
        self.act(ControlMessage::StopTimer).await
    }

    pub async fn reset(&mut self) -> Result<TimerSnapshot> {
        self.act(ControlMessage::Reset).await
    }

    pub async fn status(&mut self) -> Result<TimerSnapshot> {
        self.act(ControlMessage::Status).await
    }

    /// Display refresh loop. Renders once a second for as long as something is counting, so it
    /// ends by itself once the countdown is over or procrastination hits the ceiling.
    pub async fn watch(&mut self, shutdown: CancellationToken) -> Result<TimerSnapshot> {
        let mut refresh_point = self.clock.instant();
        loop {
            let snapshot = self.status().await?;
            if !snapshot.is_active() {
                info!("Nothing is counting anymore, stopping refresh");
                return Ok(snapshot);
            }

            refresh_point += REFRESH_INTERVAL;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    return Ok(snapshot)
                }
                _ = self.clock.sleep_until(refresh_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use serde_json::{json, Map, Value};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        cli::view::MockView,
        daemon::{
            counter::{Command, CounterTask},
            service::TimerService,
            storage::kv_store::MemoryStore,
        },
        timer::STOP_CEILING_SECS,
        utils::{
            clock::{testing::TestClock, Clock},
            logging::TEST_LOGGING,
        },
    };

    use super::Controller;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected an object"),
        }
    }

    fn counter(
        store: Arc<MemoryStore>,
        budget: u64,
        shutdown: &CancellationToken,
    ) -> (CounterTask<Arc<MemoryStore>>, mpsc::Sender<Command>) {
        *TEST_LOGGING;
        let (commands, receiver) = mpsc::channel(10);
        let service = TimerService::new(store, Box::new(TestClock::new()), budget);
        (
            CounterTask::new(service, receiver, shutdown.clone()),
            commands,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_render_results() -> Result<()> {
        let shutdown = CancellationToken::new();
        let (task, commands) = counter(Arc::new(MemoryStore::default()), 100, &shutdown);

        let mut view = MockView::new();
        view.expect_render().times(3).returning(|_| ());
        let mut controller = Controller::new(commands, view, Box::new(TestClock::new()));

        let (run_result, script_result) = tokio::join!(task.run(), async {
            let worked = controller.work().await?;
            assert!(worked.is_running);

            let stopped = controller.procrastinate().await?;
            assert!(!stopped.is_running);
            assert!(stopped.last_stop_time.is_some());

            let reset = controller.reset().await?;
            assert_eq!(reset.time_left, 100);
            assert_eq!(reset.last_stop_time, None);

            shutdown.cancel();
            anyhow::Ok(())
        });
        run_result?;
        script_result?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_ends_with_countdown() -> Result<()> {
        let shutdown = CancellationToken::new();
        let (task, commands) = counter(Arc::new(MemoryStore::default()), 3, &shutdown);

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let mut view = MockView::new();
        {
            let rendered = rendered.clone();
            view.expect_render()
                .returning(move |snapshot| rendered.lock().unwrap().push(snapshot.time_left));
        }
        let mut controller = Controller::new(commands, view, Box::new(TestClock::new()));

        let (run_result, script_result) = tokio::join!(task.run(), async {
            controller.work().await?;
            let last = controller.watch(shutdown.clone()).await?;
            assert_eq!(last.time_left, 0);
            assert!(last.is_running);

            shutdown.cancel();
            anyhow::Ok(())
        });
        run_result?;
        script_result?;

        let rendered = rendered.lock().unwrap();
        assert_eq!(rendered.first(), Some(&2));
        assert_eq!(rendered.last(), Some(&0));
        assert!(rendered.windows(2).all(|pair| pair[0] >= pair[1]));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_ends_at_ceiling() -> Result<()> {
        let clock = TestClock::new();
        let store = Arc::new(MemoryStore::new(object(json!({
            "timeLeft": 100,
            "isRunning": false,
            "firstStartTime": clock.time().timestamp(),
            "totalStopTime": STOP_CEILING_SECS - 2,
            "lastStopTime": clock.time().timestamp(),
        }))));
        let shutdown = CancellationToken::new();
        let (task, commands) = counter(store, 100, &shutdown);

        let mut view = MockView::new();
        view.expect_render().returning(|_| ());
        let mut controller = Controller::new(commands, view, Box::new(TestClock::new()));

        let (run_result, script_result) = tokio::join!(task.run(), async {
            let last = controller.watch(shutdown.clone()).await?;
            assert_eq!(last.total_stop_time, STOP_CEILING_SECS);
            assert!(!last.is_accumulating());

            shutdown.cancel();
            anyhow::Ok(())
        });
        run_result?;
        script_result?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_stops_on_shutdown() -> Result<()> {
        let shutdown = CancellationToken::new();
        let (task, commands) = counter(Arc::new(MemoryStore::default()), 1000, &shutdown);

        let mut view = MockView::new();
        view.expect_render().returning(|_| ());
        let mut controller = Controller::new(commands, view, Box::new(TestClock::new()));

        let watch_shutdown = CancellationToken::new();
        let (run_result, script_result) = tokio::join!(task.run(), async {
            controller.work().await?;
            let (watched, _) = tokio::join!(controller.watch(watch_shutdown.clone()), async {
                tokio::time::sleep(Duration::from_millis(3500)).await;
                watch_shutdown.cancel();
            });
            let last = watched?;
            assert!(last.is_running);
            assert!(last.time_left > 990);

            shutdown.cancel();
            anyhow::Ok(())
        });
        run_result?;
        script_result?;
        Ok(())
    }
}
