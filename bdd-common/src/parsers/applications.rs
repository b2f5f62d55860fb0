//! Parser for `jx get applications` output.
//!
//! Grammar: optional preamble lines (warnings), then a header line whose
//! first column is `APPLICATION`, then one row per application. Rows are
//! whitespace-separated; the pods column (`running/desired`) is optional —
//! remote environments omit it — and the URL is the first `http…` token.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ParseError, rows_after_header};

/// One application row, keyed by name in the returned map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub version: String,
    pub desired_pods: u32,
    pub running_pods: u32,
    pub url: String,
}

/// Parse the applications table into a map keyed by application name.
pub fn parse_applications(output: &str) -> Result<HashMap<String, Application>, ParseError> {
    let rows = rows_after_header(output, "APPLICATION").ok_or_else(|| ParseError::MissingHeader {
        header: "APPLICATION",
        output: output.to_string(),
    })?;

    let mut applications = HashMap::new();
    for line in rows {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };

        let mut application = Application {
            name: name.to_string(),
            version: String::new(),
            desired_pods: 0,
            running_pods: 0,
            url: String::new(),
        };

        for token in tokens {
            if token.starts_with("http://") || token.starts_with("https://") {
                application.url = token.to_string();
            } else if let Some((running, desired)) = parse_pods(token) {
                application.running_pods = running;
                application.desired_pods = desired;
            } else if application.version.is_empty() {
                application.version = token.to_string();
            }
        }

        applications.insert(application.name.clone(), application);
    }

    Ok(applications)
}

fn parse_pods(token: &str) -> Option<(u32, u32)> {
    let (running, desired) = token.split_once('/')?;
    Some((running.parse().ok()?, desired.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_staging_row_behind_a_warning_preamble() {
        let out = "
WARNING: could not find the current user name user: Current not implemented on linux/amd64
APPLICATION           STAGING PODS URL
bdd-spring-1561456570 0.0.1   1/1  http://bdd-spring-1561456570.bdd-ghe-jx-pr-4153-100-staging.35.205.242.160.nip.io";
        let applications = parse_applications(out).unwrap();
        assert_eq!(applications.len(), 1);

        let app = &applications["bdd-spring-1561456570"];
        assert_eq!(app.version, "0.0.1");
        assert_eq!(app.running_pods, 1);
        assert_eq!(app.desired_pods, 1);
        assert!(app.url.starts_with("http://bdd-spring-1561456570"));
    }

    #[test]
    fn parses_a_remote_row_without_a_pods_column() {
        let out = "APPLICATION           PRODUCTION PODS URL
bdd-spring-1617112975 0.0.1           http://bdd-spring-1617112975-myapps.34.123.71.97.nip.io";
        let applications = parse_applications(out).unwrap();
        assert_eq!(applications.len(), 1);

        let app = &applications["bdd-spring-1617112975"];
        assert_eq!(app.version, "0.0.1");
        assert_eq!(app.running_pods, 0);
        assert_eq!(app.desired_pods, 0);
        assert_eq!(
            app.url,
            "http://bdd-spring-1617112975-myapps.34.123.71.97.nip.io"
        );
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = parse_applications("error: the server is not reachable").unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader { .. }));
    }

    #[test]
    fn empty_table_yields_an_empty_map() {
        let applications = parse_applications("APPLICATION STAGING PODS URL\n").unwrap();
        assert!(applications.is_empty());
    }
}
