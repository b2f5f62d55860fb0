//! Suite lifecycle: shared work directory, spec execution, report output.
//!
//! One suite run owns one temporary work directory under the system temp
//! dir; each application under test gets its own uniquely named
//! subdirectory, so concurrent suites never collide. The directory is
//! removed at the end unless the configuration says to keep it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::SuiteConfig;
use crate::convergence::{AppUnderTest, StepError};
use crate::report::{SpecResult, SuiteReport};

/// Error type for suite lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("failed to create work directory {path}: {source}")]
    CreateWorkDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write the suite report: {0}")]
    Report(#[from] io::Error),
}

/// Final tally for one suite run.
#[derive(Debug, Clone)]
pub struct SuiteSummary {
    pub total: usize,
    pub failures: usize,
    pub report: PathBuf,
}

impl SuiteSummary {
    pub fn success(&self) -> bool {
        self.failures == 0
    }
}

/// One running suite.
pub struct Suite {
    config: SuiteConfig,
    work_dir: PathBuf,
    report: SuiteReport,
}

impl Suite {
    /// Create the shared work directory, log the configuration banner, and
    /// start collecting results under `suite_id`.
    pub fn start(suite_id: impl Into<String>, config: SuiteConfig) -> Result<Self, SuiteError> {
        let suite_id = suite_id.into();
        config.banner();

        let work_dir = std::env::temp_dir().join(format!("bdd-{:08x}", rand::random::<u32>()));
        fs::create_dir_all(&work_dir).map_err(|source| SuiteError::CreateWorkDir {
            path: work_dir.clone(),
            source,
        })?;
        info!(suite = %suite_id, dir = %work_dir.display(), "created suite work directory");

        Ok(Self {
            config,
            work_dir,
            report: SuiteReport::new(suite_id),
        })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Bind an application under test to this suite's work directory.
    pub fn app(&self, name: impl Into<String>) -> AppUnderTest<'_> {
        AppUnderTest::new(&self.config, name, &self.work_dir)
    }

    /// Run one spec, record its outcome, and return whether it passed.
    ///
    /// A failed spec does not abort the suite; later specs still run and the
    /// failure lands in the report.
    pub fn run_spec<F>(&mut self, name: &str, spec: F) -> bool
    where
        F: FnOnce(&SuiteConfig, &Path) -> Result<(), StepError>,
    {
        info!(spec = name, "spec started");
        let start = Instant::now();
        let outcome = spec(&self.config, &self.work_dir);
        let duration = start.elapsed();
        let slow = duration >= self.config.slow_spec_threshold;

        let passed = match &outcome {
            Ok(()) => {
                info!(
                    spec = name,
                    duration_ms = duration.as_millis() as u64,
                    slow,
                    "spec passed"
                );
                true
            }
            Err(err) => {
                error!(
                    spec = name,
                    duration_ms = duration.as_millis() as u64,
                    error = %err,
                    "spec failed"
                );
                false
            }
        };

        self.report.record(SpecResult {
            name: name.to_string(),
            duration,
            failure: outcome.err().map(|err| err.to_string()),
            slow,
        });
        passed
    }

    /// Write the JUnit report and clean up the work directory.
    pub fn finish(self) -> Result<SuiteSummary, SuiteError> {
        let report_path = self.report.write_junit(&self.config.reports_dir)?;
        let summary = SuiteSummary {
            total: self.report.specs().len(),
            failures: self.report.failures(),
            report: report_path,
        };

        info!(
            summary = %serde_json::json!({
                "suite": self.report.suite_id(),
                "specs": summary.total,
                "failures": summary.failures,
                "report": summary.report.display().to_string(),
            }),
            "suite finished"
        );

        if self.config.clean_work_dir {
            if let Err(err) = fs::remove_dir_all(&self.work_dir) {
                warn!(
                    dir = %self.work_dir.display(),
                    error = %err,
                    "failed to remove the work directory"
                );
            }
        } else {
            info!(dir = %self.work_dir.display(), "keeping the work directory");
        }

        Ok(summary)
    }
}

/// Unique application name: `bdd-<prefix>-<epoch seconds>`.
///
/// The epoch suffix keeps repositories created by overlapping runs apart.
pub fn unique_application_name(prefix: &str) -> String {
    format!("bdd-{}-{}", prefix, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(reports_dir: &Path) -> SuiteConfig {
        SuiteConfig::for_tests("jx", reports_dir)
    }

    #[test]
    fn records_outcomes_and_writes_the_report() {
        let reports = tempfile::tempdir().unwrap();
        let mut suite = Suite::start("lifecycle", test_config(reports.path())).unwrap();

        assert!(suite.run_spec("passes", |_, _| Ok(())));
        assert!(!suite.run_spec("fails", |_, _| {
            Err(StepError::NoApplications {
                environment: "staging".to_string(),
            })
        }));

        let summary = suite.finish().unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failures, 1);
        assert!(!summary.success());

        let xml = fs::read_to_string(&summary.report).unwrap();
        assert!(xml.contains("name=\"passes\""));
        assert!(xml.contains("no applications listed in environment staging"));
    }

    #[test]
    fn work_dir_is_removed_by_default() {
        let reports = tempfile::tempdir().unwrap();
        let suite = Suite::start("cleanup", test_config(reports.path())).unwrap();
        let work_dir = suite.work_dir().to_path_buf();
        assert!(work_dir.is_dir());

        suite.finish().unwrap();
        assert!(!work_dir.exists());
    }

    #[test]
    fn work_dir_is_kept_when_cleaning_is_disabled() {
        let reports = tempfile::tempdir().unwrap();
        let mut config = test_config(reports.path());
        config.clean_work_dir = false;

        let suite = Suite::start("keepdir", config).unwrap();
        let work_dir = suite.work_dir().to_path_buf();

        suite.finish().unwrap();
        assert!(work_dir.is_dir());
        fs::remove_dir_all(work_dir).unwrap();
    }

    #[test]
    fn spec_exceeding_the_threshold_is_flagged_slow() {
        let reports = tempfile::tempdir().unwrap();
        let mut config = test_config(reports.path());
        config.slow_spec_threshold = Duration::from_millis(10);

        let mut suite = Suite::start("slowness", config).unwrap();
        suite.run_spec("dawdles", |_, _| {
            std::thread::sleep(Duration::from_millis(30));
            Ok(())
        });

        let summary = suite.finish().unwrap();
        let xml = fs::read_to_string(&summary.report).unwrap();
        assert!(xml.contains("property name=\"slow\""));
    }

    #[test]
    fn application_names_carry_prefix_and_epoch() {
        let name = unique_application_name("nh");
        assert!(name.starts_with("bdd-nh-"));
        let suffix = name.rsplit('-').next().unwrap();
        assert!(suffix.parse::<i64>().is_ok());
    }
}
