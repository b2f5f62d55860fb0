//! Parser for `jx create pullrequest` output.
//!
//! The command logs a `Created Pull Request: <url>` line; the URL's trailing
//! numeric segment is the pull-request number, and for the common
//! `<host>/<owner>/<repo>/pull/<n>` shape the owner and repository are
//! extracted too (left empty for providers with other URL layouts).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ParseError;

/// The pull request created by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePullRequest {
    pub owner: String,
    pub repository: String,
    pub number: u32,
    pub url: String,
}

fn created_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| Regex::new(r"Created Pull Request:\s*(\S+)").unwrap())
}

/// Extract the pull-request reference from the command output.
pub fn parse_create_pull_request(output: &str) -> Result<CreatePullRequest, ParseError> {
    let missing = || ParseError::MissingPullRequest {
        output: output.to_string(),
    };

    let captures = created_line().captures(output).ok_or_else(missing)?;
    let url = captures[1].trim_end_matches('/').to_string();

    let segments: Vec<&str> = url.split('/').collect();
    let number: u32 = segments
        .last()
        .and_then(|segment| segment.parse().ok())
        .ok_or_else(missing)?;

    // https: + "" + host + owner + repo + pull + number
    let (owner, repository) = match segments.as_slice() {
        [_, _, _, owner, repository, ..] => ((*owner).to_string(), (*repository).to_string()),
        _ => (String::new(), String::new()),
    };

    Ok(CreatePullRequest {
        owner,
        repository,
        number,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_url_number_owner_and_repository() {
        let out = "Created issue tracker comment\nCreated Pull Request: https://github.com/acme/bdd-app/pull/42\n";
        let pr = parse_create_pull_request(out).unwrap();
        assert_eq!(pr.url, "https://github.com/acme/bdd-app/pull/42");
        assert_eq!(pr.number, 42);
        assert_eq!(pr.owner, "acme");
        assert_eq!(pr.repository, "bdd-app");
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        let out = "Created Pull Request: https://github.com/acme/bdd-app/pull/7/";
        let pr = parse_create_pull_request(out).unwrap();
        assert_eq!(pr.number, 7);
    }

    #[test]
    fn output_without_the_line_is_an_error() {
        let err = parse_create_pull_request("pushed branch changes-ab12c").unwrap_err();
        assert!(matches!(err, ParseError::MissingPullRequest { .. }));
    }

    #[test]
    fn non_numeric_trailing_segment_is_an_error() {
        let err =
            parse_create_pull_request("Created Pull Request: https://github.com/acme/bdd-app/pulls")
                .unwrap_err();
        assert!(matches!(err, ParseError::MissingPullRequest { .. }));
    }
}
