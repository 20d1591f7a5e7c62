use std::time::Duration;

use futures::StreamExt;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::{wrappers::IntervalStream, StreamMap};
use tracing::debug;

/// Named repeating wake-ups. Creating an alarm with an existing name replaces it. The first
/// wake-up happens one period after creation.
#[derive(Default)]
pub struct AlarmScheduler {
    alarms: StreamMap<&'static str, IntervalStream>,
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: &'static str, period: Duration) {
        debug!("Creating alarm {name} every {period:?}");
        let mut interval = interval_at(Instant::now() + period, period);
        // Missed wake-ups are not replayed, one late tick is delivered instead.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.alarms.insert(name, IntervalStream::new(interval));
    }

    /// Creates the alarm unless it's already scheduled, keeping its phase.
    pub fn ensure(&mut self, name: &'static str, period: Duration) {
        if !self.is_scheduled(name) {
            self.create(name, period);
        }
    }

    pub fn clear(&mut self, name: &'static str) -> bool {
        let cleared = self.alarms.remove(name).is_some();
        if cleared {
            debug!("Cleared alarm {name}");
        }
        cleared
    }

    pub fn clear_all(&mut self) {
        self.alarms.clear();
    }

    pub fn is_scheduled(&self, name: &'static str) -> bool {
        self.alarms.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Waits for the next alarm and returns its name. Never resolves while nothing is scheduled.
    pub async fn next(&mut self) -> &'static str {
        match self.alarms.next().await {
            Some((name, _)) => name,
            None => std::future::pending().await,
        }
    }
}
