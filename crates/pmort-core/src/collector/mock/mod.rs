//! Mock filesystem and canned host states for tests.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
