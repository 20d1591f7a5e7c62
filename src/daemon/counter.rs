use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    control::ControlMessage,
    daemon::{alarms::AlarmScheduler, service::TimerService, storage::kv_store::KeyValueStore},
    timer::{snapshot::TimerSnapshot, StopOutcome, TickOutcome, TimerState},
};

/// Decrements the work countdown.
pub const WORK_ALARM: &str = "timerTick";
/// Watches procrastination for the ceiling.
pub const STOP_ALARM: &str = "stopTick";

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A control message together with a way to report the state it produced.
#[derive(Debug)]
pub struct Command {
    pub message: ControlMessage,
    pub reply: oneshot::Sender<Result<TimerSnapshot>>,
}

/// Background counter. Owns every timer transition: commands and alarms are handled one at a
/// time, so there is nothing to race with.
pub struct CounterTask<S: KeyValueStore> {
    service: TimerService<S>,
    commands: mpsc::Receiver<Command>,
    alarms: AlarmScheduler,
    shutdown: CancellationToken,
}

impl<S: KeyValueStore> CounterTask<S> {
    pub fn new(
        service: TimerService<S>,
        commands: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            commands,
            alarms: AlarmScheduler::new(),
            shutdown,
        }
    }

    /// Executes the counter event loop.
    pub async fn run(mut self) -> Result<()> {
        let state = self.recover().await?;
        info!("Recovered timer state {:?}", state);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // Every sender is gone, nobody can control the timer anymore.
                        None => return Ok(()),
                    }
                }
                alarm = self.alarms.next() => {
                    if let Err(e) = self.handle_alarm(alarm).await {
                        error!("Failed to handle alarm {alarm}: {e:?}");
                    }
                }
            }
        }
    }

    /// Re-establishes alarms for whatever was going on before the process (re)started.
    async fn recover(&mut self) -> Result<TimerState> {
        let state = self.service.recover().await?;
        self.reschedule(&state);
        Ok(state)
    }

    async fn handle_command(&mut self, Command { message, reply }: Command) {
        debug!("Handling {message:?}");
        let result = match message {
            ControlMessage::StartTimer => self.handle_start().await,
            ControlMessage::StopTimer => self.handle_stop().await,
            ControlMessage::Reset => self.handle_reset().await,
            ControlMessage::Status => self.service.load().await,
        };

        let result = result
            .map(|state| self.service.snapshot_of(&state))
            .inspect_err(|e| error!("Failed to handle {message:?}: {e:?}"));
        if reply.send(result).is_err() {
            warn!("Requester of {message:?} went away before the reply");
        }
    }

    async fn handle_alarm(&mut self, alarm: &'static str) -> Result<()> {
        match alarm {
            WORK_ALARM | STOP_ALARM => {
                self.tick().await?;
                Ok(())
            }
            other => Err(anyhow!("Unknown alarm {other}")),
        }
    }

    async fn tick(&mut self) -> Result<TimerState> {
        let (outcome, state) = self.service.tick().await?;
        match outcome {
            TickOutcome::Decremented => debug!("Work time left {}", state.time_left),
            TickOutcome::Clamped => info!("Procrastination reached the daily ceiling"),
            TickOutcome::Idle => (),
        }
        self.reschedule(&state);
        Ok(state)
    }

    async fn handle_start(&mut self) -> Result<TimerState> {
        let (started, state) = self.service.start().await?;
        if !started {
            debug!("Work timer is already running");
            return Ok(state);
        }
        info!("Work timer started with {} seconds left", state.time_left);
        // The first decrement doesn't wait for the alarm.
        self.tick().await
    }

    async fn handle_stop(&mut self) -> Result<TimerState> {
        let (outcome, state) = self.service.stop().await?;
        match outcome {
            StopOutcome::Accumulating { was_running: true } => info!("Work timer stopped"),
            StopOutcome::Accumulating { was_running: false } => {
                debug!("Procrastination restarted while already stopped")
            }
            StopOutcome::Clamped => info!("Procrastination ceiling already reached"),
        }
        self.reschedule(&state);
        Ok(state)
    }

    async fn handle_reset(&mut self) -> Result<TimerState> {
        let state = self.service.reset().await?;
        info!("Timer reset to {} seconds", state.time_left);
        self.alarms.clear_all();
        Ok(state)
    }

    /// Keeps exactly the alarms the state needs. Running and accumulating exclude each other, so
    /// at most one alarm is ever scheduled.
    fn reschedule(&mut self, state: &TimerState) {
        if state.is_running && state.time_left > 0 {
            self.alarms.ensure(WORK_ALARM, TICK_PERIOD);
        } else {
            self.alarms.clear(WORK_ALARM);
        }

        if state.is_accumulating() {
            self.alarms.ensure(STOP_ALARM, TICK_PERIOD);
        } else {
            self.alarms.clear(STOP_ALARM);
        }
    }
}
