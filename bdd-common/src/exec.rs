//! Command execution with output capture and a wall-clock timeout.
//!
//! One invocation spawns one child process, drains stdout/stderr on reader
//! threads, and waits up to the timeout. A timed-out wait is not a typed
//! error: the result carries `timed_out = true` (exit code 124 when the kill
//! races the exit status away) and the caller's expected-exit-code check
//! turns it into a failure. Retrying is always the caller's job.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Error type for command execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("working directory does not exist: {0}")]
    WorkDirMissing(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{program} {args} exited with code {actual}, expected {expected}{timeout_note}\nstderr:\n{stderr}"
    )]
    UnexpectedExit {
        program: String,
        args: String,
        expected: i32,
        actual: i32,
        timeout_note: String,
        stderr: String,
    },
}

/// Captured result of one command execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Execute a program in `work_dir` and wait up to `timeout`.
///
/// The child is killed once the timeout elapses. Does not retry internally.
pub fn execute<I, S>(
    work_dir: &Path,
    timeout: Duration,
    program: &str,
    args: I,
) -> Result<ExecutionResult, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if !work_dir.is_dir() {
        return Err(ExecError::WorkDirMissing(work_dir.to_path_buf()));
    }

    let args: Vec<_> = args.into_iter().collect();
    let args_display: Vec<_> = args.iter().map(|s| s.as_ref().to_string_lossy()).collect();
    debug!(
        dir = %work_dir.display(),
        "executing: {} {}",
        program,
        args_display.join(" ")
    );

    let start = Instant::now();

    let mut child = Command::new(program)
        .args(&args)
        .current_dir(work_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout_handle = child
        .stdout
        .take()
        .map(|mut stdout| thread::spawn(move || read_to_string(&mut stdout)));
    let stderr_handle = child
        .stderr
        .take()
        .map(|mut stderr| thread::spawn(move || read_to_string(&mut stderr)));

    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(ExecError::Wait {
                    program: program.to_string(),
                    source,
                });
            }
        }

        if start.elapsed() >= timeout {
            timed_out = true;
            let _ = child.kill();
            break child.wait().ok();
        }

        thread::sleep(Duration::from_millis(10));
    };

    let duration = start.elapsed();
    let stdout = join_output(stdout_handle);
    let mut stderr = join_output(stderr_handle);
    if timed_out {
        if !stderr.is_empty() {
            stderr.push('\n');
        }
        stderr.push_str(&format!("process timed out after {timeout:?}"));
    }

    let exit_code = exit_status
        .and_then(|status| status.code())
        .unwrap_or(if timed_out { 124 } else { -1 });

    debug!(
        exit_code,
        duration_ms = duration.as_millis() as u64,
        timed_out,
        "command completed: {program}"
    );

    Ok(ExecutionResult {
        exit_code,
        stdout,
        stderr,
        duration,
        timed_out,
    })
}

fn read_to_string<R: Read>(reader: &mut R) -> String {
    let mut buffer = Vec::new();
    if reader.read_to_end(&mut buffer).is_ok() {
        String::from_utf8_lossy(&buffer).to_string()
    } else {
        String::new()
    }
}

fn join_output(handle: Option<thread::JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.join().unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute(
            dir.path(),
            Duration::from_secs(10),
            "sh",
            ["-c", "echo hello; echo oops >&2; exit 3"],
        )
        .unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        assert!(!result.timed_out);
    }

    #[test]
    fn kills_the_child_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let start = Instant::now();
        let result = execute(
            dir.path(),
            Duration::from_millis(200),
            "sh",
            ["-c", "sleep 30"],
        )
        .unwrap();

        assert!(result.timed_out);
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("timed out"));
        // The 30s sleep must not be awaited.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_work_dir_is_rejected() {
        let err = execute(
            Path::new("/nonexistent/bdd-work-dir"),
            Duration::from_secs(1),
            "true",
            Vec::<&str>::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::WorkDirMissing(_)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(
            dir.path(),
            Duration::from_secs(1),
            "definitely-not-a-real-binary-bdd",
            Vec::<&str>::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn combined_output_joins_both_streams() {
        let result = ExecutionResult {
            exit_code: 0,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            duration: Duration::from_millis(1),
            timed_out: false,
        };
        assert_eq!(result.combined_output(), "out\nerr");
    }
}
