//! Shell-snippet collectors (`/bin/sh -c COMMAND`).

use std::ffi::OsStr;

use crate::collector::command::run_command;
use crate::collector::{CollectError, Collector};

const SHELL: &str = "/bin/sh";

/// Runs a one-line shell command and records its stdout.
#[derive(Debug, Clone)]
pub struct ShellCollector {
    name: String,
    command: String,
}

impl ShellCollector {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }

    /// Parses a `NAME=COMMAND` specification as given on the command line.
    pub fn parse_spec(spec: &str) -> Result<Self, String> {
        let (name, command) = spec
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=COMMAND, got '{}'", spec))?;
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(format!("invalid collector name '{}'", name));
        }
        if command.trim().is_empty() {
            return Err(format!("empty command for collector '{}'", name));
        }
        Ok(Self::new(name, command))
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Collector for ShellCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> Result<String, CollectError> {
        run_command(OsStr::new(SHELL), ["-c", self.command.as_str()])
    }
}
