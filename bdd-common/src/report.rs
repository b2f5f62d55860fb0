//! JUnit-style XML reporting for a suite run.
//!
//! One `<testsuite>` element per run, one `<testcase>` per spec, written to
//! the configured reports directory as `<suite-id>.junit.xml`. Specs that
//! exceeded the slow threshold carry a `slow` property so dashboards can
//! pick them out.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Outcome of one executed spec.
#[derive(Debug, Clone)]
pub struct SpecResult {
    pub name: String,
    pub duration: Duration,
    pub failure: Option<String>,
    pub slow: bool,
}

impl SpecResult {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Collected results for one suite run.
#[derive(Debug)]
pub struct SuiteReport {
    suite_id: String,
    started: DateTime<Utc>,
    specs: Vec<SpecResult>,
}

impl SuiteReport {
    pub fn new(suite_id: impl Into<String>) -> Self {
        Self {
            suite_id: suite_id.into(),
            started: Utc::now(),
            specs: Vec::new(),
        }
    }

    pub fn suite_id(&self) -> &str {
        &self.suite_id
    }

    pub fn record(&mut self, result: SpecResult) {
        self.specs.push(result);
    }

    pub fn specs(&self) -> &[SpecResult] {
        &self.specs
    }

    pub fn failures(&self) -> usize {
        self.specs.iter().filter(|spec| !spec.passed()).count()
    }

    /// Write `<suite-id>.junit.xml` into `dir`, creating it if needed.
    pub fn write_junit(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.junit.xml", self.suite_id));
        fs::write(&path, self.to_xml())?;
        Ok(path)
    }

    fn to_xml(&self) -> String {
        let total_secs: f64 = self.specs.iter().map(|spec| spec.duration.as_secs_f64()).sum();

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" time=\"{:.3}\" timestamp=\"{}\">",
            xml_escape(&self.suite_id),
            self.specs.len(),
            self.failures(),
            total_secs,
            self.started.to_rfc3339(),
        );

        for spec in &self.specs {
            let _ = write!(
                xml,
                "  <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
                xml_escape(&spec.name),
                xml_escape(&self.suite_id),
                spec.duration.as_secs_f64(),
            );
            if spec.failure.is_none() && !spec.slow {
                xml.push_str("/>\n");
                continue;
            }
            xml.push_str(">\n");
            if spec.slow {
                xml.push_str("    <properties>\n");
                xml.push_str("      <property name=\"slow\" value=\"true\"/>\n");
                xml.push_str("    </properties>\n");
            }
            if let Some(failure) = &spec.failure {
                let _ = writeln!(
                    xml,
                    "    <failure message=\"{}\">{}</failure>",
                    xml_escape(failure),
                    xml_escape(failure),
                );
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, failure: Option<&str>, slow: bool) -> SpecResult {
        SpecResult {
            name: name.to_string(),
            duration: Duration::from_millis(1500),
            failure: failure.map(str::to_string),
            slow,
        }
    }

    #[test]
    fn renders_passing_and_failing_testcases() {
        let mut report = SuiteReport::new("create_quickstarts");
        report.record(spec("creates a quickstart", None, false));
        report.record(spec(
            "promotes to staging",
            Some("timed out after 60s: GET http://app returned status 503, expected 200"),
            false,
        ));

        let xml = report.to_xml();
        assert!(xml.contains("tests=\"2\" failures=\"1\""));
        assert!(xml.contains("<testcase name=\"creates a quickstart\""));
        assert!(xml.contains("<failure message=\"timed out after 60s"));
    }

    #[test]
    fn escapes_xml_metacharacters() {
        let mut report = SuiteReport::new("suite");
        report.record(spec("handles <odd> & \"quoted\" names", Some("a < b"), false));

        let xml = report.to_xml();
        assert!(xml.contains("handles &lt;odd&gt; &amp; &quot;quoted&quot; names"));
        assert!(xml.contains("a &lt; b"));
        assert!(!xml.contains("a < b\""));
    }

    #[test]
    fn slow_specs_carry_a_property() {
        let mut report = SuiteReport::new("suite");
        report.record(spec("ponderous", None, true));

        let xml = report.to_xml();
        assert!(xml.contains("<property name=\"slow\" value=\"true\"/>"));
    }

    #[test]
    fn writes_the_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = SuiteReport::new("spring");
        report.record(spec("creates a spring application", None, false));

        let path = report.write_junit(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "spring.junit.xml");
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("<?xml"));
        assert!(contents.contains("creates a spring application"));
    }
}
