//! Convergence-polling framework for the Jenkins X end-to-end suites.
//!
//! The suites drive the platform CLI against a live cluster and assert on
//! eventually-consistent state: builds completing, applications answering in
//! an environment, preview environments appearing for pull requests. This
//! crate provides the pieces those assertions are composed from:
//!
//! - [`retry`] — exponential-backoff retry bounded by an elapsed-time budget
//! - [`exec`] / [`runner`] — command execution with output capture and
//!   wall-clock timeouts
//! - [`probe`] — single-shot HTTP GET probing with transition-only logging
//! - [`parsers`] — typed records from the CLI's tabular output
//! - [`convergence`] — the "wait until X" predicates built from the above
//! - [`config`] — immutable suite configuration read once from the
//!   environment
//! - [`suite`] / [`report`] — work-directory lifecycle and JUnit XML output

pub mod config;
pub mod convergence;
pub mod exec;
pub mod logging;
pub mod parsers;
pub mod probe;
pub mod report;
pub mod retry;
pub mod runner;
pub mod suite;

pub use config::{ConfigError, SuiteConfig, Timeouts};
pub use convergence::{
    AppUnderTest, StepError, git_provider_url, pull_request_has_label, pull_request_lacks_label,
    wait_for_pull_request,
};
pub use exec::{ExecError, ExecutionResult, execute};
pub use logging::init_test_logging;
pub use parsers::{
    Activity, Application, CreatePullRequest, GitServer, ParseError, Preview, parse_activities,
    parse_applications, parse_create_pull_request, parse_git_servers, parse_previews,
};
pub use probe::{ProbeError, ProbeState, UrlProbe};
pub use report::{SpecResult, SuiteReport};
pub use retry::{BackoffPolicy, RetryError, RetryableError, retry_until};
pub use runner::CliRunner;
pub use suite::{Suite, SuiteError, SuiteSummary, unique_application_name};
