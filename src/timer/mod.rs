//! Timer transitions. Every change to the work countdown or to the procrastination total goes
//! through [TimerState], which is the only place the invariants below are enforced:
//!  - `is_running` implies `last_stop_time` is `None`.
//!  - `total_stop_time` never exceeds [STOP_CEILING_SECS]; reaching it clears `last_stop_time`.
//!  - `time_left` only decreases, only while running, and never below 0.

pub mod snapshot;

use chrono::{DateTime, TimeZone, Utc};

use crate::utils::time::same_day;

/// Daily maximum of procrastination time.
pub const STOP_CEILING_SECS: u64 = 86_400;

/// Four hours of work every day.
pub const DEFAULT_WORK_BUDGET_SECS: u64 = 4 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub time_left: u64,
    pub is_running: bool,
    pub first_start_time: Option<DateTime<Utc>>,
    /// Baseline of procrastination time. While `last_stop_time` is set the live total is
    /// computed by [TimerState::stop_total].
    pub total_stop_time: u64,
    pub last_stop_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Decremented,
    /// Procrastination reached the ceiling and stopped accumulating.
    Clamped,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Accumulating { was_running: bool },
    /// The ceiling was already reached, nothing is accumulated anymore.
    Clamped,
}

impl TimerState {
    pub fn new(work_budget: u64) -> Self {
        Self {
            time_left: work_budget,
            is_running: false,
            first_start_time: None,
            total_stop_time: 0,
            last_stop_time: None,
        }
    }

    pub fn is_accumulating(&self) -> bool {
        !self.is_running && self.last_stop_time.is_some()
    }

    /// Procrastination time at `now`, including the interval since the last stop.
    pub fn stop_total(&self, now: DateTime<Utc>) -> u64 {
        let current = match self.last_stop_time {
            Some(last) if !self.is_running => {
                let elapsed = (now - last).num_seconds().max(0) as u64;
                self.total_stop_time.saturating_add(elapsed)
            }
            _ => self.total_stop_time,
        };
        current.min(STOP_CEILING_SECS)
    }

    pub fn ceiling_reached(&self, now: DateTime<Utc>) -> bool {
        self.stop_total(now) >= STOP_CEILING_SECS
    }

    /// Repairs combinations that can't be produced by transitions, for example after the store
    /// was edited by hand.
    pub fn normalize(&mut self) {
        if self.is_running {
            self.last_stop_time = None;
        }
        if self.total_stop_time >= STOP_CEILING_SECS {
            self.total_stop_time = STOP_CEILING_SECS;
            self.last_stop_time = None;
        }
    }

    /// Drops the previous day's progress. `first_start_time` belongs to the day it was recorded
    /// on, and so does the procrastination that was measured against it. Returns true if
    /// anything was discarded.
    pub fn roll_over<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> bool {
        if matches!(self.first_start_time, Some(first) if same_day(&first, now)) {
            return false;
        }
        let rolled = *self;
        self.first_start_time = None;
        self.total_stop_time = 0;
        self.last_stop_time = None;
        rolled != *self
    }

    /// Starts the work countdown. Accumulated procrastination is folded into the baseline so
    /// that it survives the switch. Returns false if the timer was already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_running {
            return false;
        }
        self.first_start_time.get_or_insert(now);
        self.total_stop_time = self.stop_total(now);
        self.last_stop_time = None;
        self.is_running = true;
        true
    }

    pub fn stop(&mut self, now: DateTime<Utc>) -> StopOutcome {
        let was_running = self.is_running;
        self.is_running = false;

        if self.ceiling_reached(now) {
            self.total_stop_time = STOP_CEILING_SECS;
            self.last_stop_time = None;
            return StopOutcome::Clamped;
        }

        self.first_start_time.get_or_insert(now);
        self.total_stop_time = self.stop_total(now);
        self.last_stop_time = Some(now);
        StopOutcome::Accumulating { was_running }
    }

    /// Single per-second transition. Decrements the countdown while running, otherwise checks
    /// whether procrastination reached the ceiling.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.is_running {
            if self.time_left > 0 {
                self.time_left -= 1;
                return TickOutcome::Decremented;
            }
            return TickOutcome::Idle;
        }

        if self.last_stop_time.is_some() && self.ceiling_reached(now) {
            self.total_stop_time = STOP_CEILING_SECS;
            self.last_stop_time = None;
            return TickOutcome::Clamped;
        }
        TickOutcome::Idle
    }

    pub fn reset(&mut self, work_budget: u64) {
        *self = Self::new(work_budget);
    }
}
