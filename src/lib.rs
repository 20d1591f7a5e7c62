//! Daily work countdown with a procrastination counter next to it.
//! A small daemon owns both timers and keeps them in a key-value store, the cli sends it
//! Work / Procrastinate / Reset actions and renders whatever state comes back.
//!

pub mod cli;
pub mod config;
pub mod control;
pub mod daemon;
pub mod timer;
pub mod utils;
