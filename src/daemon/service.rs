use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    daemon::storage::{
        entities::{TimerEntity, TIMER_KEYS},
        kv_store::KeyValueStore,
    },
    timer::{snapshot::TimerSnapshot, StopOutcome, TickOutcome, TimerState},
    utils::clock::Clock,
};

/// Bridges [TimerState] transitions and [KeyValueStore]. The store is the single source of
/// truth: every operation reads it fresh, applies one transition and writes back only what
/// changed.
pub struct TimerService<S: KeyValueStore> {
    store: S,
    clock: Box<dyn Clock>,
    work_budget: u64,
}

impl<S: KeyValueStore> TimerService<S> {
    pub fn new(store: S, clock: Box<dyn Clock>, work_budget: u64) -> Self {
        Self {
            store,
            clock,
            work_budget,
        }
    }

    async fn load_entity(&self) -> Result<TimerEntity> {
        let values = self.store.get(&TIMER_KEYS).await?;
        Ok(TimerEntity::from_values(&values))
    }

    /// Current state with the day rollover applied. Nothing is written.
    pub async fn load(&self) -> Result<TimerState> {
        let mut state = self.load_entity().await?.to_state(self.work_budget);
        state.roll_over(&self.clock.local_time());
        Ok(state)
    }

    /// Applies `transition` to the freshly loaded state and persists the difference.
    async fn update<R>(
        &self,
        transition: impl FnOnce(&mut TimerState, DateTime<Utc>) -> R,
    ) -> Result<(R, TimerState)> {
        let entity = self.load_entity().await?;
        let mut state = entity.to_state(self.work_budget);
        if state.roll_over(&self.clock.local_time()) {
            info!("New day started, discarding previous progress");
        }

        let result = transition(&mut state, self.clock.time());

        let changes = entity.changes(&state);
        if !changes.is_empty() {
            debug!("Persisting {changes:?}");
            self.store.set(changes).await?;
        }
        Ok((result, state))
    }

    /// Initializes unset values and persists the rollover. Used when the daemon starts.
    pub async fn recover(&self) -> Result<TimerState> {
        let ((), state) = self.update(|_, _| ()).await?;
        Ok(state)
    }

    pub async fn tick(&self) -> Result<(TickOutcome, TimerState)> {
        self.update(|state, now| state.tick(now)).await
    }

    pub async fn start(&self) -> Result<(bool, TimerState)> {
        self.update(|state, now| state.start(now)).await
    }

    pub async fn stop(&self) -> Result<(StopOutcome, TimerState)> {
        self.update(|state, now| state.stop(now)).await
    }

    pub async fn reset(&self) -> Result<TimerState> {
        let work_budget = self.work_budget;
        let ((), state) = self
            .update(|state, _| state.reset(work_budget))
            .await?;
        Ok(state)
    }

    pub fn snapshot_of(&self, state: &TimerState) -> TimerSnapshot {
        TimerSnapshot::new(state, self.work_budget, self.clock.time())
    }

    /// Read-only snapshot, used when the daemon isn't there to answer.
    pub async fn peek(&self) -> Result<TimerSnapshot> {
        let state = self.load().await?;
        Ok(self.snapshot_of(&state))
    }
}
