//! nodewatch -- tracks which backend node serves a web page.
//!
//! Each run fetches the target page, reads the node id out of its footer,
//! and appends one observation to a JSON history, flagging failovers
//! between consecutive observations.

pub mod analysis;
pub mod config;
pub mod detect;
pub mod footer;
pub mod nodes;
pub mod probes;
pub mod runner;
pub mod storage;

pub use runner::{
    format_timestamp, run, run_with_config, Clock, FixedClock, ProbeOutcome, SystemClock,
};
