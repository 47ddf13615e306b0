//! Stdout passthrough, selected with an output directory of `-`.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::{DateTime, Local};

use super::OutputSink;

/// Writes `name:` followed by the collector's text to a stream.
///
/// Each record is written under one lock so parallel collectors do not
/// interleave.
#[derive(Debug)]
pub struct StdoutSink<W = io::Stdout> {
    out: Mutex<W>,
}

impl StdoutSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StdoutSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> OutputSink for StdoutSink<W> {
    fn begin_iteration(&self, _started: DateTime<Local>) -> io::Result<()> {
        Ok(())
    }

    fn record(&self, name: &str, text: &str) -> io::Result<()> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}:", name)?;
        out.write_all(text.as_bytes())?;
        if !text.is_empty() && !text.ends_with('\n') {
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}
