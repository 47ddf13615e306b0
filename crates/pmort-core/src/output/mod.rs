//! Output sinks receiving collector artifacts.
//!
//! A sink is told when an iteration starts and then receives one `record`
//! call per successful collector. In parallel mode `record` is called from
//! several threads at once, so sinks are `Send + Sync`.

mod directory;
mod memory;
mod stdout;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};

pub use directory::{CURRENT_LINK, DirectorySink, RUN_DIR_FORMAT};
pub use memory::MemorySink;
pub use stdout::StdoutSink;

/// Destination for collector output.
pub trait OutputSink: Send + Sync {
    /// Prepares storage for an iteration started at `started`.
    fn begin_iteration(&self, started: DateTime<Local>) -> io::Result<()>;

    /// Persists the text produced by collector `name`.
    fn record(&self, name: &str, text: &str) -> io::Result<()>;
}

/// Where the daemon sends output, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Timestamped run directories under this path.
    Directory(PathBuf),
    /// Passthrough to standard output, selected with `-`.
    Stdout,
}

impl OutputTarget {
    /// Sentinel path meaning "write to stdout".
    pub const STDOUT_SENTINEL: &'static str = "-";

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.as_os_str() == Self::STDOUT_SENTINEL {
            OutputTarget::Stdout
        } else {
            OutputTarget::Directory(path.to_path_buf())
        }
    }

    /// Builds the sink, creating the output directory if needed.
    pub fn open(&self) -> io::Result<Arc<dyn OutputSink>> {
        match self {
            OutputTarget::Directory(dir) => Ok(Arc::new(DirectorySink::create(dir)?)),
            OutputTarget::Stdout => Ok(Arc::new(StdoutSink::stdout())),
        }
    }
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::Directory(dir) => write!(f, "{}", dir.display()),
            OutputTarget::Stdout => write!(f, "stdout"),
        }
    }
}
