//! In-memory sink for tests and embedding.

use std::io;
use std::sync::Mutex;

use chrono::{DateTime, Local};

use super::OutputSink;

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    iterations: Mutex<Vec<DateTime<Local>>>,
    records: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(name, text)` pairs recorded so far.
    pub fn records(&self) -> Vec<(String, String)> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded collector names, sorted.
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records().into_iter().map(|(name, _)| name).collect();
        names.sort();
        names
    }

    /// Number of `begin_iteration` calls.
    pub fn iterations(&self) -> usize {
        self.iterations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl OutputSink for MemorySink {
    fn begin_iteration(&self, started: DateTime<Local>) -> io::Result<()> {
        self.iterations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(started);
        Ok(())
    }

    fn record(&self, name: &str, text: &str) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name.to_string(), text.to_string()));
        Ok(())
    }
}
