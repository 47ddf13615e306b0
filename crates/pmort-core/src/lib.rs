//! pmort-core: adaptive post-mortem collection library.
//!
//! Provides:
//! - `collector`: the `Collector` trait, built-in load average, script and
//!   shell collectors, `/proc/loadavg` sampling, filesystem abstraction
//! - `learner`: persisted learned facts and the load-to-interval formula
//! - `scheduler`: the serial/parallel collection loop, timer and shutdown
//! - `output`: run directory, stdout and in-memory sinks
//! - `config`: daemon configuration and validation

pub mod collector;
pub mod config;
pub mod learner;
pub mod output;
pub mod scheduler;

/// Short git SHA the library was built from, or `unknown`.
pub const GIT_SHA: &str = env!("PMORT_GIT_SHA");
