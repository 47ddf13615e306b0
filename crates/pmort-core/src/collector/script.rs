//! Executable script collectors and their discovery.
//!
//! A script qualifies when it is executable and its first line is a `#!`
//! shebang. The shebang is split on whitespace and the script path appended,
//! so `#!/usr/bin/env bash -e` in `net/sockets` runs
//! `/usr/bin/env bash -e <dir>/net/sockets`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::command::run_command;
use crate::collector::traits::FileSystem;
use crate::collector::{CollectError, Collector};

/// Runs one discovered script and records its stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCollector {
    name: String,
    path: PathBuf,
    /// Interpreter and its arguments, taken from the shebang.
    interpreter: Vec<String>,
}

impl ScriptCollector {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, interpreter: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            interpreter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full argv: interpreter, its arguments, then the script path.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.interpreter.clone();
        argv.push(self.path.to_string_lossy().into_owned());
        argv
    }
}

impl Collector for ScriptCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> Result<String, CollectError> {
        let (program, args) = self
            .interpreter
            .split_first()
            .ok_or_else(|| CollectError::Spawn(std::io::Error::other("empty interpreter")))?;
        let args = args
            .iter()
            .map(|a| OsStr::new(a.as_str()))
            .chain(std::iter::once(self.path.as_os_str()));
        run_command(OsStr::new(program), args)
    }
}

/// Parses the interpreter out of a script's first line.
///
/// Returns `None` if the line is not a shebang or names no interpreter.
pub fn parse_shebang(content: &str) -> Option<Vec<String>> {
    let first = content.lines().next()?.trim();
    let rest = first.strip_prefix("#!")?;
    let parts: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() { None } else { Some(parts) }
}

/// Finds runnable scripts under `dir`, recursively.
///
/// Collectors are named after their path relative to `dir` with separators
/// replaced by `.` (`net/sockets` becomes `net.sockets`). The result is
/// sorted by path. A missing directory yields an empty list.
pub fn discover_scripts<F: FileSystem>(fs: &F, dir: &Path) -> Vec<ScriptCollector> {
    if !fs.is_dir(dir) {
        debug!(dir = %dir.display(), "collectors directory not found");
        return Vec::new();
    }

    let mut files = Vec::new();
    walk(fs, dir, &mut files);
    files.sort();

    let mut scripts = Vec::new();
    for path in files {
        if !fs.is_executable(&path) {
            debug!(path = %path.display(), "skipping non-executable file");
            continue;
        }

        let first = match fs.read_first_line(&path) {
            Ok(line) => line,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let Some(interpreter) = parse_shebang(&first) else {
            debug!(path = %path.display(), "skipping file without shebang");
            continue;
        };

        let name = collector_name(dir, &path);
        debug!(collector = %name, interpreter = ?interpreter, "found script");
        scripts.push(ScriptCollector::new(name, path, interpreter));
    }

    scripts
}

fn walk<F: FileSystem>(fs: &F, dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read collectors directory");
            return;
        }
    };

    for entry in entries {
        let hidden = entry
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if fs.is_dir(&entry) {
            walk(fs, &entry, files);
        } else {
            files.push(entry);
        }
    }
}

fn collector_name(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(".")
}
