//! Suite configuration.
//!
//! All knobs come from environment variables read exactly once at suite
//! start; the resulting [`SuiteConfig`] is immutable and passed by reference
//! to every component that needs it. Timeout variables are whole minutes.

pub mod env;

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

pub use env::{ConfigError, EnvReader, EnvVarError};

/// Wait budgets for the convergence predicates, one per kind of wait.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Budget for a build to complete successfully.
    pub build_completes: Duration,
    /// Budget for an application to be promoted to the staging environment.
    pub build_running_in_staging: Duration,
    /// Budget for the pipeline activity record to appear and settle.
    pub pipeline_activity_complete: Duration,
    /// Budget for a given URL to return the expected status code.
    pub url_returns: Duration,
    /// Budget for a preview environment URL to be available.
    pub preview_url_returns: Duration,
    /// Budget for short command-line executions.
    pub cmd_line: Duration,
    /// Default budget for long CLI sessions (create, promote, delete).
    pub session_wait: Duration,
    /// Budget for a deployment rollout to finish.
    pub deployment_rollout: Duration,
    /// Budget for a chat-ops action to be reflected on the pull request.
    pub chatops_action_wait: Duration,
}

/// Immutable configuration for one suite run.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Path to the platform CLI binary under test.
    pub jx_binary: PathBuf,
    /// Git organisation that owns the repositories created by the tests.
    pub git_organisation: String,
    /// Git provider base URL; blank means discover via `jx get gitserver`.
    pub git_provider_url: String,
    /// Git provider kind passed to create commands.
    pub git_kind: String,
    pub timeouts: Timeouts,
    /// Skip TLS verification when probing deployed application URLs.
    pub insecure_skip_verify: bool,
    /// Delete applications from staging after they are promoted.
    pub delete_applications: bool,
    /// Delete git repositories created during the run.
    pub delete_repos: bool,
    /// Exercise the pull-request / preview-environment phase.
    pub test_pull_request: bool,
    /// Wait for the first release to be promoted to staging.
    pub wait_for_first_release: bool,
    /// Run the chat-ops label specs.
    pub chatops_commands: bool,
    /// Verify the PipelineActivity pull-title update during PR flows.
    pub pipeline_activity_check: bool,
    /// Remove the shared work directory at suite end.
    pub clean_work_dir: bool,
    /// Directory receiving the JUnit XML reports.
    pub reports_dir: PathBuf,
    /// Duration beyond which a spec is flagged slow in the report.
    pub slow_spec_threshold: Duration,
}

impl SuiteConfig {
    /// Read the configuration from the environment.
    ///
    /// A missing `GIT_ORGANISATION` or an unparseable value is fatal; every
    /// problem found is reported in one error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut reader = EnvReader::new();

        let config = Self {
            jx_binary: PathBuf::from(reader.get_string("BDD_JX", "jx")),
            git_organisation: reader.required_string("GIT_ORGANISATION"),
            git_provider_url: reader.get_string("GIT_PROVIDER_URL", "https://github.com"),
            git_kind: reader.get_string("GIT_KIND", "github"),
            timeouts: Timeouts {
                build_completes: reader.get_minutes("BDD_TIMEOUT_BUILD_COMPLETES", 40),
                build_running_in_staging: reader
                    .get_minutes("BDD_TIMEOUT_BUILD_RUNNING_IN_STAGING", 20),
                pipeline_activity_complete: reader
                    .get_minutes("BDD_TIMEOUT_PIPELINE_ACTIVITY_COMPLETE", 15),
                url_returns: reader.get_minutes("BDD_TIMEOUT_URL_RETURNS", 15),
                preview_url_returns: reader.get_minutes("BDD_TIMEOUT_PREVIEW_URL_RETURNS", 15),
                cmd_line: reader.get_minutes("BDD_TIMEOUT_CMD_LINE", 1),
                session_wait: reader.get_minutes("BDD_TIMEOUT_SESSION_WAIT", 60),
                deployment_rollout: reader.get_minutes("BDD_TIMEOUT_DEPLOYMENT_ROLLOUT", 3),
                chatops_action_wait: reader.get_minutes("BDD_TIMEOUT_PROW_ACTION_WAIT", 5),
            },
            insecure_skip_verify: reader.get_bool("BDD_URL_INSECURE_SKIP_VERIFY", false),
            delete_applications: !reader.get_bool("JX_DISABLE_DELETE_APP", false),
            delete_repos: !reader.get_bool("JX_DISABLE_DELETE_REPO", false),
            test_pull_request: !reader.get_bool("JX_DISABLE_TEST_PULL_REQUEST", false),
            wait_for_first_release: !reader.get_bool("JX_DISABLE_WAIT_FOR_FIRST_RELEASE", false),
            chatops_commands: reader.get_bool("BDD_ENABLE_TEST_CHATOPS_COMMANDS", false),
            pipeline_activity_check: !reader.get_bool("BDD_DISABLE_PIPELINEACTIVITY_CHECK", false),
            clean_work_dir: !reader.get_bool("JX_DISABLE_CLEAN_DIR", false),
            reports_dir: PathBuf::from(reader.get_string("REPORTS_DIR", "build/reports")),
            slow_spec_threshold: reader.get_millis("SLOW_SPEC_THRESHOLD", 50_000),
        };

        reader.finish()?;
        Ok(config)
    }

    /// Configuration for hermetic tests: second-scale budgets and an
    /// explicit binary path, no environment access.
    pub fn for_tests(jx_binary: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            jx_binary: jx_binary.into(),
            git_organisation: "bdd-tests".to_string(),
            git_provider_url: "https://github.com".to_string(),
            git_kind: "github".to_string(),
            timeouts: Timeouts {
                build_completes: Duration::from_secs(15),
                build_running_in_staging: Duration::from_secs(10),
                pipeline_activity_complete: Duration::from_secs(10),
                url_returns: Duration::from_secs(5),
                preview_url_returns: Duration::from_secs(10),
                cmd_line: Duration::from_secs(5),
                session_wait: Duration::from_secs(10),
                deployment_rollout: Duration::from_secs(5),
                chatops_action_wait: Duration::from_secs(5),
            },
            insecure_skip_verify: false,
            delete_applications: true,
            delete_repos: true,
            test_pull_request: true,
            wait_for_first_release: true,
            chatops_commands: false,
            pipeline_activity_check: true,
            clean_work_dir: true,
            reports_dir: reports_dir.into(),
            slow_spec_threshold: Duration::from_millis(50_000),
        }
    }

    /// Log every recognized variable and its effect for this run.
    pub fn banner(&self) {
        fn toggled(enabled: bool, on: &str, off: &str) -> String {
            if enabled { on.to_string() } else { off.to_string() }
        }

        info!("BDD_JX:                              {}", self.jx_binary.display());
        info!("GIT_ORGANISATION:                    {}", self.git_organisation);
        info!("GIT_PROVIDER_URL:                    {}", self.git_provider_url);
        info!("GIT_KIND:                            {}", self.git_kind);
        info!(
            "JX_DISABLE_DELETE_APP:               applications {}",
            toggled(
                self.delete_applications,
                "will be deleted from staging after they are promoted",
                "will NOT be deleted from staging"
            )
        );
        info!(
            "JX_DISABLE_DELETE_REPO:              repositories created in the run {}",
            toggled(self.delete_repos, "will be deleted", "will NOT be deleted")
        );
        info!(
            "JX_DISABLE_TEST_PULL_REQUEST:        the pull request / preview phase {}",
            toggled(self.test_pull_request, "will run", "is skipped")
        );
        info!(
            "JX_DISABLE_WAIT_FOR_FIRST_RELEASE:   {}",
            toggled(
                self.wait_for_first_release,
                "waiting for the first release to reach staging",
                "NOT waiting for the first release"
            )
        );
        info!(
            "BDD_ENABLE_TEST_CHATOPS_COMMANDS:    chat-ops specs {}",
            toggled(self.chatops_commands, "enabled", "disabled")
        );
        info!(
            "BDD_DISABLE_PIPELINEACTIVITY_CHECK:  PipelineActivity verification {}",
            toggled(self.pipeline_activity_check, "enabled", "disabled")
        );
        info!(
            "JX_DISABLE_CLEAN_DIR:                work directory {}",
            toggled(self.clean_work_dir, "removed at suite end", "kept after the run")
        );
        info!(
            "BDD_URL_INSECURE_SKIP_VERIFY:        TLS verification {}",
            toggled(self.insecure_skip_verify, "skipped when probing", "enforced")
        );
        info!("REPORTS_DIR:                         {}", self.reports_dir.display());
        info!(
            "SLOW_SPEC_THRESHOLD:                 {} ms",
            self.slow_spec_threshold.as_millis()
        );
        info!(
            "BDD_TIMEOUT_BUILD_COMPLETES:         {} min",
            self.timeouts.build_completes.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_BUILD_RUNNING_IN_STAGING: {} min",
            self.timeouts.build_running_in_staging.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_PIPELINE_ACTIVITY_COMPLETE: {} min",
            self.timeouts.pipeline_activity_complete.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_URL_RETURNS:             {} min",
            self.timeouts.url_returns.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_PREVIEW_URL_RETURNS:     {} min",
            self.timeouts.preview_url_returns.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_CMD_LINE:                {} min",
            self.timeouts.cmd_line.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_SESSION_WAIT:            {} min",
            self.timeouts.session_wait.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_DEPLOYMENT_ROLLOUT:      {} min",
            self.timeouts.deployment_rollout.as_secs() / 60
        );
        info!(
            "BDD_TIMEOUT_PROW_ACTION_WAIT:        {} min",
            self.timeouts.chatops_action_wait.as_secs() / 60
        );
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}
