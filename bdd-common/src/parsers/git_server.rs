//! Parser for `jx get gitserver` output.
//!
//! Grammar: a header line containing a `URL` column, then one row per
//! configured server: name, URL, and optionally the provider kind.

use serde::{Deserialize, Serialize};

use super::ParseError;

/// One configured git server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitServer {
    pub name: String,
    pub url: String,
    pub kind: String,
}

/// Parse the git server listing, preserving row order.
pub fn parse_git_servers(output: &str) -> Result<Vec<GitServer>, ParseError> {
    let mut lines = output.lines();
    lines
        .by_ref()
        .find(|line| line.split_whitespace().any(|token| token == "URL"))
        .ok_or_else(|| ParseError::MissingHeader {
            header: "URL",
            output: output.to_string(),
        })?;

    let mut servers = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [name, url, kind, ..] => servers.push(GitServer {
                name: (*name).to_string(),
                url: (*url).to_string(),
                kind: (*kind).to_string(),
            }),
            [name, url] => servers.push(GitServer {
                name: (*name).to_string(),
                url: (*url).to_string(),
                kind: String::new(),
            }),
            _ => {
                return Err(ParseError::MalformedRow {
                    context: "git server",
                    line: line.to_string(),
                });
            }
        }
    }

    Ok(servers)
}
