//! Runner binding the CLI under test to a working directory.
//!
//! Wraps [`crate::exec::execute`] with the configured binary, a default
//! timeout, and an expected exit code. The expected-exit-code check is what
//! turns a timed-out or failed command into a step failure; the runner never
//! retries — that is the convergence layer's job.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::SuiteConfig;
use crate::exec::{ExecError, ExecutionResult, execute};

/// Runs the platform CLI (or another program) in a fixed working directory.
#[derive(Debug, Clone)]
pub struct CliRunner {
    binary: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
    expected_exit: i32,
}

impl CliRunner {
    /// Runner for the configured `jx` binary with the session-wait timeout
    /// and an expected exit code of zero.
    pub fn new(config: &SuiteConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: config.jx_binary.clone(),
            work_dir: work_dir.into(),
            timeout: config.timeouts.session_wait,
            expected_exit: 0,
        }
    }

    /// Runner for an arbitrary binary (git, kubectl).
    pub fn for_binary(
        binary: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
            timeout,
            expected_exit: 0,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_expected_exit(mut self, expected_exit: i32) -> Self {
        self.expected_exit = expected_exit;
        self
    }

    /// Run the binary and assert the expected exit code.
    pub fn run<I, S>(&self, args: I) -> Result<ExecutionResult, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_with_timeout(self.timeout, args)
    }

    /// Run the binary and return its trimmed stdout.
    pub fn run_with_output<I, S>(&self, args: I) -> Result<String, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let result = self.run_with_timeout(self.timeout, args)?;
        Ok(result.stdout.trim().to_string())
    }

    /// Run the binary with no wall-clock bound and return its trimmed stdout.
    ///
    /// For commands whose own completion is the thing being waited for.
    pub fn run_with_output_no_timeout<I, S>(&self, args: I) -> Result<String, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let result = self.run_with_timeout(Duration::MAX, args)?;
        Ok(result.stdout.trim().to_string())
    }

    fn run_with_timeout<I, S>(&self, timeout: Duration, args: I) -> Result<ExecutionResult, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|s| s.as_ref().to_string_lossy().into_owned())
            .collect();
        let program = self.binary.to_string_lossy().into_owned();
        debug!(dir = %self.work_dir.display(), "running {} {}", program, args.join(" "));

        let result = execute(&self.work_dir, timeout, &program, &args)?;
        if result.exit_code != self.expected_exit {
            return Err(ExecError::UnexpectedExit {
                program,
                args: args.join(" "),
                expected: self.expected_exit,
                actual: result.exit_code,
                timeout_note: if result.timed_out {
                    " (timed out)".to_string()
                } else {
                    String::new()
                },
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}
