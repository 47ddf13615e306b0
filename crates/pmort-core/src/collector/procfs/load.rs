//! One-minute load average sampling.

use std::path::{Path, PathBuf};

use crate::collector::procfs::parser::{LoadAvg, ParseError, parse_loadavg};
use crate::collector::traits::FileSystem;

/// Error type for load sampling.
#[derive(Debug)]
pub enum LoadError {
    /// `/proc/loadavg` could not be read.
    Io(std::io::Error),
    /// `/proc/loadavg` content was not understood.
    Parse(ParseError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<ParseError> for LoadError {
    fn from(e: ParseError) -> Self {
        LoadError::Parse(e)
    }
}

/// Source of the host's load averages.
pub trait LoadSource: Send + Sync {
    /// Returns all three load averages.
    fn load_average(&self) -> Result<LoadAvg, LoadError>;

    /// Returns the one-minute load average.
    fn one_minute(&self) -> Result<f64, LoadError> {
        self.load_average().map(|l| l.load1)
    }
}

/// Reads load averages from `<proc_path>/loadavg`.
#[derive(Debug, Clone)]
pub struct ProcLoadSource<F: FileSystem> {
    fs: F,
    loadavg_path: PathBuf,
}

impl<F: FileSystem> ProcLoadSource<F> {
    /// Creates a load source rooted at `proc_path` (usually "/proc").
    pub fn new(fs: F, proc_path: impl AsRef<Path>) -> Self {
        Self {
            fs,
            loadavg_path: proc_path.as_ref().join("loadavg"),
        }
    }
}

impl<F: FileSystem> LoadSource for ProcLoadSource<F> {
    fn load_average(&self) -> Result<LoadAvg, LoadError> {
        let content = self.fs.read_to_string(&self.loadavg_path)?;
        Ok(parse_loadavg(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_one_minute_from_mock() {
        let source = ProcLoadSource::new(MockFs::busy_system(), "/proc");
        let load = source.one_minute().unwrap();
        assert!((load - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_loadavg_is_io_error() {
        let source = ProcLoadSource::new(MockFs::new(), "/proc");
        assert!(matches!(source.one_minute(), Err(LoadError::Io(_))));
    }

    #[test]
    fn test_garbled_loadavg_is_parse_error() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/loadavg", "garbage\n");
        let source = ProcLoadSource::new(fs, "/proc");
        assert!(matches!(source.load_average(), Err(LoadError::Parse(_))));
    }
}
