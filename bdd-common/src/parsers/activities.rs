//! Parser for `jx get activities` output.
//!
//! Grammar: unindented rows of the form `<job> #<build> <started> <duration>
//! <status…>` are pipeline activities; indented rows are their steps and are
//! skipped. The status keeps everything to the end of the line, so
//! `Succeeded Version: 0.0.1` stays intact and prefix matching on
//! `Succeeded` works.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ParseError;

/// One pipeline activity, keyed `<job> #<build>` in the returned map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub job: String,
    pub build: u32,
    pub started: String,
    pub duration: String,
    pub status: String,
}

fn activity_row() -> &'static Regex {
    static ROW: OnceLock<Regex> = OnceLock::new();
    ROW.get_or_init(|| {
        Regex::new(
            r"^(?P<job>\S+) #(?P<build>\d+)\s+(?P<started>\S+)\s+(?P<duration>\S+)\s+(?P<status>\S.*)$",
        )
        .unwrap()
    })
}

/// Parse the activities listing into a map keyed by `<job> #<build>`.
///
/// An empty map is a normal outcome while the activity record has not been
/// created yet; callers decide whether that is retryable.
pub fn parse_activities(output: &str) -> Result<HashMap<String, Activity>, ParseError> {
    let mut activities = HashMap::new();

    for line in output.lines() {
        if line.starts_with(char::is_whitespace) || line.trim().is_empty() {
            continue;
        }
        let Some(captures) = activity_row().captures(line) else {
            continue;
        };

        let build: u32 = captures["build"]
            .parse()
            .map_err(|_| ParseError::MalformedRow {
                context: "activity",
                line: line.to_string(),
            })?;
        let job = captures["job"].to_string();

        activities.insert(
            format!("{job} #{build}"),
            Activity {
                job,
                build,
                started: captures["started"].to_string(),
                duration: captures["duration"].to_string(),
                status: captures["status"].trim_end().to_string(),
            },
        );
    }

    Ok(activities)
}
