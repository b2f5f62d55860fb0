//! Parsers for the tabular output of the platform CLI.
//!
//! Each submodule owns the grammar for one output shape and exposes a single
//! `parse_*` function returning typed records or a [`ParseError`]. Parse
//! failures are treated as retryable by the convergence layer: while a
//! record is still being created upstream, the output may be empty, carry
//! warning preambles, or be partially populated.

pub mod activities;
pub mod applications;
pub mod git_server;
pub mod previews;
pub mod pull_request;

pub use activities::{Activity, parse_activities};
pub use applications::{Application, parse_applications};
pub use git_server::{GitServer, parse_git_servers};
pub use previews::{Preview, parse_previews};
pub use pull_request::{CreatePullRequest, parse_create_pull_request};

/// Structured parse failure naming the output shape and the offending text.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no {header} header found in output:\n{output}")]
    MissingHeader {
        header: &'static str,
        output: String,
    },

    #[error("malformed {context} row: {line}")]
    MalformedRow {
        context: &'static str,
        line: String,
    },

    #[error("no pull request reference found in output:\n{output}")]
    MissingPullRequest { output: String },
}

impl crate::retry::RetryableError for ParseError {
    fn is_retryable(&self) -> bool {
        // Output that does not parse yet may simply not be populated yet.
        true
    }
}

/// Lines following the first line whose first column starts with
/// `header_prefix`, skipping any preamble (warnings, blank lines) the CLI
/// prints before the table.
pub(crate) fn rows_after_header<'a>(
    output: &'a str,
    header_prefix: &str,
) -> Option<impl Iterator<Item = &'a str>> {
    let mut lines = output.lines();
    lines
        .by_ref()
        .find(|line| line.trim_start().starts_with(header_prefix))?;
    Some(lines.filter(|line| !line.trim().is_empty()))
}
