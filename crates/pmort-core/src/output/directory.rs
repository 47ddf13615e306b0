//! Timestamped run directories with a `current` symlink.
//!
//! ```text
//! <output_dir>/
//!   20261016093000/
//!     load_average.log
//!     net.sockets.log
//!   current -> 20261016093000
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use super::OutputSink;

/// `chrono` format of run directory names.
pub const RUN_DIR_FORMAT: &str = "%Y%m%d%H%M%S";

/// Name of the symlink pointing at the latest run directory.
pub const CURRENT_LINK: &str = "current";

/// Writes each collector to `<run_dir>/<name>.log`.
#[derive(Debug)]
pub struct DirectorySink {
    base_dir: PathBuf,
    run_dir: Mutex<Option<PathBuf>>,
}

impl DirectorySink {
    /// Creates the sink, creating `base_dir` if it does not exist.
    pub fn create(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            run_dir: Mutex::new(None),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory of the iteration in progress, if one has begun.
    pub fn run_dir(&self) -> Option<PathBuf> {
        self.run_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    #[cfg(unix)]
    fn update_current_link(&self, run_name: &str) -> io::Result<()> {
        let link = self.base_dir.join(CURRENT_LINK);
        let tmp = self.base_dir.join(format!(".{}.tmp", CURRENT_LINK));

        match fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::os::unix::fs::symlink(run_name, &tmp)?;
        fs::rename(&tmp, &link)
    }

    #[cfg(not(unix))]
    fn update_current_link(&self, run_name: &str) -> io::Result<()> {
        debug!(run = run_name, "symlinks unsupported, not updating current link");
        Ok(())
    }
}

impl OutputSink for DirectorySink {
    fn begin_iteration(&self, started: DateTime<Local>) -> io::Result<()> {
        let run_name = started.format(RUN_DIR_FORMAT).to_string();
        let run_dir = self.base_dir.join(&run_name);

        let mut current = self
            .run_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Records must not land in the previous run if this one fails.
        *current = None;

        fs::create_dir_all(&run_dir)?;
        if let Err(e) = self.update_current_link(&run_name) {
            warn!(
                link = %self.base_dir.join(CURRENT_LINK).display(),
                error = %e,
                "failed to update current symlink"
            );
        }

        debug!(run_dir = %run_dir.display(), "started run directory");
        *current = Some(run_dir);
        Ok(())
    }

    fn record(&self, name: &str, text: &str) -> io::Result<()> {
        let run_dir = self.run_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no run directory for this iteration")
        })?;

        let path = run_dir.join(format!("{}.log", name));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(text.as_bytes())
    }
}
