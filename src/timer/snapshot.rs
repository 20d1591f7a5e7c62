use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TimerState, STOP_CEILING_SECS};

/// Read-only view of [TimerState] at a moment. This is what gets rendered and sent to clients,
/// so the live procrastination total is already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub time_left: u64,
    pub work_budget: u64,
    pub is_running: bool,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub first_start_time: Option<DateTime<Utc>>,
    pub total_stop_time: u64,
    pub stop_ceiling: u64,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_stop_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub taken_at: DateTime<Utc>,
}

impl TimerSnapshot {
    pub fn new(state: &TimerState, work_budget: u64, now: DateTime<Utc>) -> Self {
        Self {
            time_left: state.time_left,
            work_budget,
            is_running: state.is_running,
            first_start_time: state.first_start_time,
            total_stop_time: state.stop_total(now),
            stop_ceiling: STOP_CEILING_SECS,
            last_stop_time: state.last_stop_time,
            taken_at: now,
        }
    }

    pub fn work_passed(&self) -> u64 {
        self.work_budget.saturating_sub(self.time_left)
    }

    pub fn stop_remaining(&self) -> u64 {
        self.stop_ceiling.saturating_sub(self.total_stop_time)
    }

    pub fn is_accumulating(&self) -> bool {
        !self.is_running && self.last_stop_time.is_some() && self.stop_remaining() > 0
    }

    /// Whether any of the numbers can still change without user input.
    pub fn is_active(&self) -> bool {
        (self.is_running && self.time_left > 0) || self.is_accumulating()
    }
}
