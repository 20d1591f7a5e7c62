//!  Storage is organized through [kv_store::KeyValueStore].
//!  The basic idea is:
//!   - State is a flat key-value mapping with JSON values, shared by the daemon and the cli.
//!   - Writes merge into the mapping, the last write wins.
//!   - [entities::TimerEntity] maps the keys onto a [crate::timer::TimerState]. Missing or
//!     malformed values are treated as unset.

pub mod entities;
pub mod kv_store;
