//! Library half of the `promptline-worker` binary.
//!
//! Split out so the integration tests can reach configuration loading,
//! checkpoint persistence and output writing without spawning a process.

pub mod checkpoint;
pub mod config;
pub mod output;
