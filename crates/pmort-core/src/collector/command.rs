//! Runs an external command and captures its stdout as collector output.

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use tracing::trace;

use crate::collector::CollectError;

/// Longest stderr excerpt kept in a `CollectError::Exit`.
const MAX_STDERR_LEN: usize = 512;

/// Runs `program` with `args`, returning stdout on success.
///
/// stdin is closed. A non-zero exit becomes `CollectError::Exit` carrying the
/// trimmed head of stderr.
pub(crate) fn run_command<I, S>(program: &OsStr, args: I) -> Result<String, CollectError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(CollectError::Spawn)?;

    trace!(
        program = %program.to_string_lossy(),
        status = %output.status,
        stdout_len = output.stdout.len(),
        "command finished"
    );

    if !output.status.success() {
        return Err(CollectError::Exit {
            status: output.status,
            stderr: stderr_excerpt(&output.stderr),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| CollectError::InvalidOutput)
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_STDERR_LEN {
        return text.to_string();
    }
    let mut end = MAX_STDERR_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_captures_stdout() {
        let out = run_command(OsStr::new("/bin/sh"), ["-c", "echo hello"]).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_run_command_non_zero_exit() {
        let err = run_command(OsStr::new("/bin/sh"), ["-c", "echo boom >&2; exit 3"])
            .unwrap_err();
        match err {
            CollectError::Exit { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_command_missing_program() {
        let err = run_command(OsStr::new("/nonexistent/pmort-test-binary"), [] as [&str; 0])
            .unwrap_err();
        assert!(matches!(err, CollectError::Spawn(_)));
    }

    #[test]
    fn test_stderr_excerpt_truncates() {
        let long = "x".repeat(MAX_STDERR_LEN * 2);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert_eq!(excerpt.len(), MAX_STDERR_LEN + 3);
        assert!(excerpt.ends_with("..."));
    }
}
