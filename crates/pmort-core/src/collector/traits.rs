//! Filesystem access used by load sampling and collector discovery.
//!
//! Reading `/proc/loadavg` and walking the collectors directory both go through
//! the `FileSystem` trait so tests can swap in `MockFs` instead of touching the
//! host.

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Longest first line [`FileSystem::read_first_line`] returns, in bytes.
pub const MAX_FIRST_LINE_LEN: u64 = 4096;

/// Abstraction for the filesystem operations pmort needs.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Reads the first line of a file, without its line terminator.
    ///
    /// At most [`MAX_FIRST_LINE_LEN`] bytes are read. Invalid UTF-8 is
    /// replaced rather than rejected, so binaries yield a harmless line.
    fn read_first_line(&self, path: &Path) -> io::Result<String>;

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a regular file with any execute bit set.
    fn is_executable(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// Entry order is unspecified; callers sort when they need determinism.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read_first_line(&self, path: &Path) -> io::Result<String> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file.take(MAX_FIRST_LINE_LEN));
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line)?;
        Ok(first_line(&String::from_utf8_lossy(&line)).to_string())
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[cfg(unix)]
    fn is_executable(&self, path: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_executable(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// `content` up to its first line terminator.
pub(crate) fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_real_fs_read_to_string() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loadavg");
        std::fs::write(&path, "0.15 0.10 0.05 1/150 1234\n").unwrap();

        let fs = RealFs::new();
        let content = fs.read_to_string(&path).unwrap();
        assert!(content.starts_with("0.15"));
    }

    #[test]
    fn test_real_fs_is_dir() {
        let dir = tempdir().unwrap();
        let fs = RealFs::new();
        assert!(fs.is_dir(dir.path()));
        assert!(!fs.is_dir(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn test_real_fs_read_first_line() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh -e\r\necho hi\n").unwrap();

        let fs = RealFs::new();
        assert_eq!(fs.read_first_line(&script).unwrap(), "#!/bin/sh -e");
        assert!(fs.read_first_line(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_real_fs_read_first_line_is_bounded() {
        let dir = tempdir().unwrap();
        let blob = dir.path().join("blob");
        let mut content = vec![0x7f, b'E', b'L', b'F', 0xff, 0xfe];
        content.resize(1024 * 1024, 0xab);
        std::fs::write(&blob, &content).unwrap();

        let line = RealFs::new().read_first_line(&blob).unwrap();
        assert!(line.len() <= 3 * MAX_FIRST_LINE_LEN as usize);
        assert!(!line.starts_with("#!"));
    }

    #[test]
    fn test_real_fs_read_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a"), "").unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();

        let fs = RealFs::new();
        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_fs_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("run.sh");
        let plain = dir.path().join("notes.txt");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        std::fs::write(&plain, "hello").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o644)).unwrap();

        let fs = RealFs::new();
        assert!(fs.is_executable(&script));
        assert!(!fs.is_executable(&plain));
        assert!(!fs.is_executable(dir.path()));
    }
}
