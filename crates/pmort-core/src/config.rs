//! Daemon configuration, built once at startup and passed to constructors.

use std::path::PathBuf;
use std::time::Duration;

use crate::learner::{DEFAULT_LOAD_THRESHOLD, Fact, FactLayout, IntervalBounds};
use crate::output::OutputTarget;

pub const DEFAULT_CACHE_DIR: &str = "/var/cache/pmort";
pub const DEFAULT_OUTPUT_DIR: &str = "/var/log/pmort";
pub const DEFAULT_COLLECTORS_DIR: &str = "/etc/pmort/collectors.d";
pub const DEFAULT_PROC_PATH: &str = "/proc";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MinimumInterval(f64),
    IntervalOrder { minimum: f64, maximum: f64 },
    IntervalTooLarge(f64),
    LoadThreshold(f64),
    EmptyCacheDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MinimumInterval(v) => {
                write!(f, "minimum interval must be a positive number of seconds, got {}", v)
            }
            ConfigError::IntervalOrder { minimum, maximum } => write!(
                f,
                "maximum interval ({}) must not be below minimum interval ({})",
                maximum, minimum
            ),
            ConfigError::IntervalTooLarge(v) => {
                write!(f, "maximum interval {} is too large to schedule", v)
            }
            ConfigError::LoadThreshold(v) => {
                write!(f, "load threshold must be a finite non-negative number, got {}", v)
            }
            ConfigError::EmptyCacheDir => write!(f, "cache directory must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Interval floor, in seconds.
    pub minimum_interval: f64,
    /// Interval used when the host is idle, in seconds.
    pub maximum_interval: f64,
    /// Learned maximum load used before anything has been persisted.
    pub load_threshold_default: f64,
    pub cache_dir: PathBuf,
    pub fact_layout: FactLayout,
    pub output: OutputTarget,
    pub collectors_dir: PathBuf,
    pub proc_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimum_interval: 1.0,
            maximum_interval: 600.0,
            load_threshold_default: DEFAULT_LOAD_THRESHOLD,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            fact_layout: FactLayout::default(),
            output: OutputTarget::Directory(PathBuf::from(DEFAULT_OUTPUT_DIR)),
            collectors_dir: PathBuf::from(DEFAULT_COLLECTORS_DIR),
            proc_path: PathBuf::from(DEFAULT_PROC_PATH),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.minimum_interval.is_finite() && self.minimum_interval > 0.0) {
            return Err(ConfigError::MinimumInterval(self.minimum_interval));
        }
        if !(self.maximum_interval.is_finite() && self.maximum_interval >= self.minimum_interval) {
            return Err(ConfigError::IntervalOrder {
                minimum: self.minimum_interval,
                maximum: self.maximum_interval,
            });
        }
        if Duration::try_from_secs_f64(self.maximum_interval).is_err() {
            return Err(ConfigError::IntervalTooLarge(self.maximum_interval));
        }
        if !(self.load_threshold_default.is_finite() && self.load_threshold_default >= 0.0) {
            return Err(ConfigError::LoadThreshold(self.load_threshold_default));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCacheDir);
        }
        Ok(())
    }

    /// The learned-load fact for the configured layout and default.
    pub fn fact(&self) -> Fact {
        self.fact_layout.fact().with_default(self.load_threshold_default)
    }

    /// Interval bounds. Out-of-range values saturate; [`Config::validate`]
    /// rejects them first.
    pub fn interval_bounds(&self) -> IntervalBounds {
        IntervalBounds {
            minimum: saturating_secs(self.minimum_interval),
            maximum: saturating_secs(self.maximum_interval),
        }
    }
}

fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
