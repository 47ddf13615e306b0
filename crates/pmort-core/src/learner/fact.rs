//! File-per-fact persistence under the cache directory.
//!
//! Each fact is a single float literal on the first line of its own file.
//! Reads never fail: an absent, unreadable or malformed file yields the
//! fact's default.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Default one-minute load threshold before anything has been learned.
pub const DEFAULT_LOAD_THRESHOLD: f64 = 0.1;

/// A named scalar persisted across iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fact {
    pub name: &'static str,
    /// Path relative to the cache directory.
    pub file: &'static str,
    pub default: f64,
}

impl Fact {
    /// Learned maximum load stored as `<cache>/load_threshold`.
    pub const LOAD_THRESHOLD: Fact = Fact {
        name: "load_threshold",
        file: "load_threshold",
        default: DEFAULT_LOAD_THRESHOLD,
    };

    /// Learned maximum load stored as
    /// `<cache>/learned/maximum_one_minute_load.txt`.
    pub const MAXIMUM_ONE_MINUTE_LOAD: Fact = Fact {
        name: "maximum_one_minute_load",
        file: "learned/maximum_one_minute_load.txt",
        default: DEFAULT_LOAD_THRESHOLD,
    };

    /// Returns the same fact with a different default.
    pub const fn with_default(self, default: f64) -> Fact {
        Fact { default, ..self }
    }
}

/// Which file layout the learned maximum load uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactLayout {
    /// `<cache>/load_threshold`
    #[default]
    Threshold,
    /// `<cache>/learned/maximum_one_minute_load.txt`
    Learned,
}

impl FactLayout {
    pub fn fact(self) -> Fact {
        match self {
            FactLayout::Threshold => Fact::LOAD_THRESHOLD,
            FactLayout::Learned => Fact::MAXIMUM_ONE_MINUTE_LOAD,
        }
    }
}

/// Why a persisted fact could not be used.
#[derive(Debug)]
pub enum FactError {
    /// No file has been written yet.
    Missing,
    /// The file exists but could not be read.
    Io(io::Error),
    /// The first line is not a finite float.
    Malformed(String),
}

impl std::fmt::Display for FactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactError::Missing => write!(f, "not learned yet"),
            FactError::Io(e) => write!(f, "I/O error: {}", e),
            FactError::Malformed(content) => write!(f, "malformed value '{}'", content),
        }
    }
}

impl std::error::Error for FactError {}

impl From<io::Error> for FactError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            FactError::Missing
        } else {
            FactError::Io(e)
        }
    }
}

/// Reads and writes facts under a cache directory.
#[derive(Debug, Clone)]
pub struct FactStore {
    cache_dir: PathBuf,
}

impl FactStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Location of `fact`'s backing file.
    pub fn path(&self, fact: &Fact) -> PathBuf {
        self.cache_dir.join(fact.file)
    }

    /// Returns the persisted value, or the fact's default.
    pub fn get(&self, fact: &Fact) -> f64 {
        match self.read(fact) {
            Ok(value) => value,
            Err(FactError::Missing) => {
                debug!(fact = fact.name, default = fact.default, "fact not learned yet, using default");
                fact.default
            }
            Err(e) => {
                warn!(fact = fact.name, error = %e, default = fact.default, "failed to read fact, using default");
                fact.default
            }
        }
    }

    /// Reads the persisted value without falling back.
    pub fn read(&self, fact: &Fact) -> Result<f64, FactError> {
        let content = fs::read_to_string(self.path(fact))?;
        let first = content.lines().next().unwrap_or("").trim();
        match first.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(FactError::Malformed(first.to_string())),
        }
    }

    /// Persists `value`, replacing the file atomically.
    ///
    /// The value is written to a sibling `.tmp` file, synced, then renamed over
    /// the target, so a crash mid-write leaves the previous value intact.
    pub fn put(&self, fact: &Fact, value: f64) -> io::Result<()> {
        let path = self.path(fact);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)?;
        writeln!(file, "{}", value)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fresh_cache_returns_default() {
        let dir = tempdir().unwrap();
        let store = FactStore::new(dir.path());
        assert_eq!(store.get(&Fact::LOAD_THRESHOLD), 0.1);
        assert!(matches!(
            store.read(&Fact::LOAD_THRESHOLD),
            Err(FactError::Missing)
        ));
    }

    #[test]
    fn test_reads_persisted_value_exactly() {
        let dir = tempdir().unwrap();
        let learned = dir.path().join("learned");
        fs::create_dir_all(&learned).unwrap();
        fs::write(learned.join("maximum_one_minute_load.txt"), "4.56").unwrap();

        let store = FactStore::new(dir.path());
        assert_eq!(store.get(&Fact::MAXIMUM_ONE_MINUTE_LOAD), 4.56);
    }

    #[test]
    fn test_only_first_line_is_read() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("load_threshold"), "2.5\nleftover junk\n").unwrap();

        let store = FactStore::new(dir.path());
        assert_eq!(store.get(&Fact::LOAD_THRESHOLD), 2.5);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let dir = tempdir().unwrap();
        let store = FactStore::new(dir.path());

        for content in ["not a number", "", "inf", "NaN\n"] {
            fs::write(dir.path().join("load_threshold"), content).unwrap();
            assert!(matches!(
                store.read(&Fact::LOAD_THRESHOLD),
                Err(FactError::Malformed(_))
            ));
            assert_eq!(store.get(&Fact::LOAD_THRESHOLD), 0.1);
        }
    }

    #[test]
    fn test_put_round_trip_and_creates_parent() {
        let dir = tempdir().unwrap();
        let store = FactStore::new(dir.path().join("cache"));
        let fact = Fact::MAXIMUM_ONE_MINUTE_LOAD;

        store.put(&fact, 4.56).unwrap();
        assert_eq!(store.get(&fact), 4.56);
        assert!(!store.path(&fact).with_extension("tmp").exists());

        let content = fs::read_to_string(store.path(&fact)).unwrap();
        assert_eq!(content, "4.56\n");
    }

    #[test]
    fn test_with_default() {
        let fact = Fact::LOAD_THRESHOLD.with_default(0.7);
        assert_eq!(fact.default, 0.7);
        assert_eq!(fact.file, "load_threshold");

        let dir = tempdir().unwrap();
        assert_eq!(FactStore::new(dir.path()).get(&fact), 0.7);
    }

    #[test]
    fn test_layout_selects_fact() {
        assert_eq!(FactLayout::default().fact(), Fact::LOAD_THRESHOLD);
        assert_eq!(FactLayout::Learned.fact(), Fact::MAXIMUM_ONE_MINUTE_LOAD);
    }
}
