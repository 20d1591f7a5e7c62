use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::timer::TimerState;

pub const TIME_LEFT: &str = "timeLeft";
pub const IS_RUNNING: &str = "isRunning";
pub const FIRST_START_TIME: &str = "firstStartTime";
pub const TOTAL_STOP_TIME: &str = "totalStopTime";
pub const LAST_STOP_TIME: &str = "lastStopTime";

pub const TIMER_KEYS: [&str; 5] = [
    TIME_LEFT,
    IS_RUNNING,
    FIRST_START_TIME,
    TOTAL_STOP_TIME,
    LAST_STOP_TIME,
];

/// Timer state exactly as it was found in the store. `None` means the key is missing, null, or
/// holds something that can't be read. Timestamps are stored as epoch seconds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimerEntity {
    pub time_left: Option<u64>,
    pub is_running: Option<bool>,
    pub first_start_time: Option<DateTime<Utc>>,
    pub total_stop_time: Option<u64>,
    pub last_stop_time: Option<DateTime<Utc>>,
}

impl TimerEntity {
    pub fn from_values(values: &Map<String, Value>) -> Self {
        Self {
            time_left: field(values, TIME_LEFT),
            is_running: field(values, IS_RUNNING),
            first_start_time: timestamp_field(values, FIRST_START_TIME),
            total_stop_time: field(values, TOTAL_STOP_TIME),
            last_stop_time: timestamp_field(values, LAST_STOP_TIME),
        }
    }

    /// Fills unset values with defaults.
    pub fn to_state(&self, work_budget: u64) -> TimerState {
        let mut state = TimerState {
            time_left: self.time_left.unwrap_or(work_budget),
            is_running: self.is_running.unwrap_or(false),
            first_start_time: self.first_start_time,
            total_stop_time: self.total_stop_time.unwrap_or(0),
            last_stop_time: self.last_stop_time,
        };
        state.normalize();
        state
    }

    /// Values that have to be written for the store to hold `state`.
    pub fn changes(&self, state: &TimerState) -> Map<String, Value> {
        let mut values = Map::new();
        if self.time_left != Some(state.time_left) {
            values.insert(TIME_LEFT.into(), state.time_left.into());
        }
        if self.is_running != Some(state.is_running) {
            values.insert(IS_RUNNING.into(), state.is_running.into());
        }
        if self.first_start_time != state.first_start_time {
            values.insert(FIRST_START_TIME.into(), timestamp_value(state.first_start_time));
        }
        if self.total_stop_time != Some(state.total_stop_time) {
            values.insert(TOTAL_STOP_TIME.into(), state.total_stop_time.into());
        }
        if self.last_stop_time != state.last_stop_time {
            values.insert(LAST_STOP_TIME.into(), timestamp_value(state.last_stop_time));
        }
        values
    }
}

fn field<T: DeserializeOwned>(values: &Map<String, Value>, key: &str) -> Option<T> {
    match values.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring illegal value {value} for {key}: {e}");
                None
            }
        },
    }
}

fn timestamp_field(values: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let seconds = field::<i64>(values, key)?;
    let moment = DateTime::from_timestamp(seconds, 0);
    if moment.is_none() {
        warn!("Ignoring out of range timestamp {seconds} for {key}");
    }
    moment
}

fn timestamp_value(moment: Option<DateTime<Utc>>) -> Value {
    moment.map_or(Value::Null, |v| v.timestamp().into())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    use crate::timer::TimerState;

    use super::{TimerEntity, TIMER_KEYS};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected an object"),
        }
    }

    #[test]
    fn test_missing_values_are_defaulted() {
        let entity = TimerEntity::from_values(&Map::new());
        assert_eq!(entity, TimerEntity::default());
        assert_eq!(entity.to_state(100), TimerState::new(100));
    }

    #[test]
    fn test_illegal_values_are_unset() {
        let entity = TimerEntity::from_values(&object(json!({
            "timeLeft": "soon",
            "isRunning": 1,
            "firstStartTime": null,
            "totalStopTime": -4,
            "lastStopTime": "yesterday",
        })));
        assert_eq!(entity, TimerEntity::default());
    }

    #[test]
    fn test_reads_stored_values() {
        let entity = TimerEntity::from_values(&object(json!({
            "timeLeft": 42,
            "isRunning": false,
            "firstStartTime": 1530705600,
            "totalStopTime": 10,
            "lastStopTime": 1530705700,
        })));
        let state = entity.to_state(100);
        assert_eq!(state.time_left, 42);
        assert_eq!(
            state.first_start_time,
            Some(Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap())
        );
        assert_eq!(state.total_stop_time, 10);
        assert!(state.is_accumulating());
    }

    #[test]
    fn test_changes_only_contain_differences() {
        let entity = TimerEntity::from_values(&object(json!({
            "timeLeft": 42,
            "isRunning": true,
            "totalStopTime": 0,
        })));
        let mut state = entity.to_state(100);
        assert!(entity.changes(&state).is_empty());

        state.time_left -= 1;
        let changes = entity.changes(&state);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["timeLeft"], 41);
    }

    #[test]
    fn test_unset_store_is_fully_initialized() {
        let entity = TimerEntity::default();
        let mut state = entity.to_state(100);
        let changes = entity.changes(&state);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes["timeLeft"], 100);

        state.stop(Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap());
        let changes = entity.changes(&state);
        assert_eq!(changes["lastStopTime"], 1530705600);
        assert!(changes.keys().all(|key| TIMER_KEYS.contains(&key.as_str())));
    }
}
