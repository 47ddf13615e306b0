//! Pre-built mock filesystem scenarios for testing.
//!
//! These mirror the load situations the scheduler has to tell apart: a quiet
//! host that should be polled rarely and serially, and a host under duress.

use super::filesystem::MockFs;

impl MockFs {
    /// A quiet host: one-minute load well below the default threshold.
    pub fn idle_system() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/loadavg", "0.05 0.03 0.01 1/150 1234\n");
        fs
    }

    /// A host under duress with a handful of discoverable collector scripts.
    ///
    /// `/etc/pmort/collectors.d` contains two runnable scripts, one script
    /// without a shebang and one non-executable file.
    pub fn busy_system() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/loadavg", "4.50 3.20 2.10 8/200 5000\n");
        fs.add_executable(
            "/etc/pmort/collectors.d/processes.sh",
            "#!/bin/sh\nps aux\n",
        );
        fs.add_executable(
            "/etc/pmort/collectors.d/net/sockets",
            "#!/usr/bin/env bash -e\nss -tanp\n",
        );
        fs.add_executable("/etc/pmort/collectors.d/no_shebang.sh", "uptime\n");
        fs.add_file(
            "/etc/pmort/collectors.d/disabled.sh",
            "#!/bin/sh\ndf -h\n",
        );
        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::FileSystem;
    use std::path::Path;

    #[test]
    fn test_idle_system_loadavg() {
        let fs = MockFs::idle_system();
        let loadavg = fs.read_to_string(Path::new("/proc/loadavg")).unwrap();
        assert!(loadavg.starts_with("0.05"));
    }

    #[test]
    fn test_busy_system_layout() {
        let fs = MockFs::busy_system();
        assert!(fs.is_dir(Path::new("/etc/pmort/collectors.d/net")));
        assert!(fs.is_executable(Path::new("/etc/pmort/collectors.d/processes.sh")));
        assert!(!fs.is_executable(Path::new("/etc/pmort/collectors.d/disabled.sh")));
    }
}
