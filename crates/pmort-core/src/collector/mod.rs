//! Collectors: the units of work pmort runs on every iteration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           CollectorSet                           │
//! │  ┌──────────────────────┐ ┌─────────────────┐ ┌────────────────┐ │
//! │  │ LoadAverageCollector │ │ ScriptCollector │ │ ShellCollector │ │
//! │  │  - /proc/loadavg     │ │  - collectors.d │ │  - sh -c ...   │ │
//! │  └──────────┬───────────┘ └────────┬────────┘ └───────┬────────┘ │
//! │             │                      └─────────┬────────┘          │
//! │      ┌──────▼──────┐              ┌──────────▼──────────┐        │
//! │      │ LoadSource  │              │     run_command     │        │
//! │      └──────┬──────┘              └─────────────────────┘        │
//! │      ┌──────▼──────┐                                             │
//! │      │ FileSystem  │ (trait: RealFs / MockFs)                    │
//! │      └─────────────┘                                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler only sees the `Collector` trait and the ordered
//! `CollectorSet`; discovery of scripts happens before the set is handed over.
//!
//! ```
//! use pmort_core::collector::{CollectorSet, LoadAverageCollector, MockFs, ProcLoadSource};
//!
//! let mut set = CollectorSet::new();
//! set.register(LoadAverageCollector::new(ProcLoadSource::new(MockFs::idle_system(), "/proc")));
//! assert_eq!(set.names(), vec!["load_average"]);
//! ```

mod command;
pub mod load_average;
pub mod mock;
pub mod procfs;
pub mod script;
pub mod shell;
pub mod traits;

use std::process::ExitStatus;

use tracing::warn;

pub use load_average::LoadAverageCollector;
pub use mock::MockFs;
pub use procfs::{LoadError, LoadSource, ProcLoadSource};
pub use script::{ScriptCollector, discover_scripts};
pub use shell::ShellCollector;
pub use traits::{FileSystem, RealFs};

/// Error type for a single collector run.
#[derive(Debug)]
pub enum CollectError {
    /// The command could not be started.
    Spawn(std::io::Error),
    /// The command ran but exited unsuccessfully.
    Exit { status: ExitStatus, stderr: String },
    /// The command wrote something other than UTF-8 to stdout.
    InvalidOutput,
    /// The load average could not be sampled.
    Load(LoadError),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Spawn(e) => write!(f, "failed to start: {}", e),
            CollectError::Exit { status, stderr } if stderr.is_empty() => {
                write!(f, "exited with {}", status)
            }
            CollectError::Exit { status, stderr } => {
                write!(f, "exited with {}: {}", status, stderr)
            }
            CollectError::InvalidOutput => write!(f, "output is not valid UTF-8"),
            CollectError::Load(e) => write!(f, "load average unavailable: {}", e),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<LoadError> for CollectError {
    fn from(e: LoadError) -> Self {
        CollectError::Load(e)
    }
}

/// A named unit of work producing a text artifact.
///
/// Collectors are shared across threads when the scheduler runs them in
/// parallel, so implementations must be `Send + Sync` and take `&self`.
pub trait Collector: Send + Sync {
    /// Name used for the output artifact and in logs.
    fn name(&self) -> &str;

    /// Runs the collector once.
    fn collect(&self) -> Result<String, CollectError>;
}

/// Ordered collection of collectors handed to the scheduler.
#[derive(Default)]
pub struct CollectorSet {
    collectors: Vec<Box<dyn Collector>>,
}

impl CollectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a collector.
    ///
    /// Returns `false` and drops the collector if one with the same name is
    /// already registered, since both would write the same artifact.
    pub fn register(&mut self, collector: impl Collector + 'static) -> bool {
        self.register_boxed(Box::new(collector))
    }

    /// Appends an already boxed collector. See [`CollectorSet::register`].
    pub fn register_boxed(&mut self, collector: Box<dyn Collector>) -> bool {
        if self.collectors.iter().any(|c| c.name() == collector.name()) {
            warn!(
                collector = collector.name(),
                "duplicate collector name, skipping"
            );
            return false;
        }
        self.collectors.push(collector);
        true
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Collector> {
        self.collectors.iter().map(|c| c.as_ref())
    }

    /// Collector names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }
}

impl<C: Collector + 'static> Extend<C> for CollectorSet {
    fn extend<T: IntoIterator<Item = C>>(&mut self, iter: T) {
        for collector in iter {
            self.register(collector);
        }
    }
}
