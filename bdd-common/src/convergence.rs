//! Convergence predicates: wait until the cluster reaches an observable
//! state or a budget runs out.
//!
//! Every predicate follows the same life cycle: not started, polling,
//! then exactly one of succeeded / timed out / fatal. Polling self-loops on
//! retryable failures — records that do not exist yet, output that does not
//! parse yet, URLs that do not answer yet — until the elapsed-time budget is
//! exhausted. Only a pipeline that reached a terminal failed status stops a
//! wait early.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SuiteConfig;
use crate::exec::ExecError;
use crate::parsers::{self, Activity, Application, CreatePullRequest, ParseError, Preview};
use crate::probe::{ProbeError, ProbeState, UrlProbe};
use crate::retry::{BackoffPolicy, RetryError, RetryableError, retry_until};
use crate::runner::CliRunner;

/// Delay before polling the activity list, so the record has a chance to be
/// updated after the run completes.
pub const ACTIVITY_SETTLE_DELAY: Duration = Duration::from_secs(15);

/// Failure of one convergence step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no applications listed in environment {environment}")]
    NoApplications { environment: String },

    #[error("application {name} not found in environment {environment}")]
    ApplicationNotFound { name: String, environment: String },

    #[error("no URL for application {name} in environment {environment}")]
    MissingUrl { name: String, environment: String },

    #[error("no activity recorded yet for {job}")]
    NoActivities { job: String },

    #[error("expected exactly one activity for {job}, found {count}")]
    AmbiguousActivity { job: String, count: usize },

    #[error("no activity found for {job} at build 1 or 2")]
    ActivityNotFound { job: String },

    #[error("pipeline for {job} reached terminal status: {status}")]
    PipelineFailed { job: String, status: String },

    #[error("no preview application URL found for pull request {pull_request}")]
    PreviewNotFound { pull_request: String },

    #[error("pull request did not match: {0}")]
    PullRequestMismatch(String),

    #[error("at least one git server must be configured")]
    NoGitServer,

    #[error("timed out after {budget:?} ({attempts} attempts): {last}")]
    Timeout {
        budget: Duration,
        attempts: u32,
        #[source]
        last: Box<StepError>,
    },
}

impl RetryableError for StepError {
    fn is_retryable(&self) -> bool {
        // A definitively failed pipeline will not become healthy by waiting.
        !matches!(self, Self::PipelineFailed { .. })
    }
}

impl StepError {
    fn from_retry(err: RetryError<StepError>) -> Self {
        match err {
            RetryError::Fatal(err) => err,
            RetryError::BudgetExhausted {
                budget,
                attempts,
                last,
            } => Self::Timeout {
                budget,
                attempts,
                last: Box::new(last),
            },
        }
    }
}

/// One application under test, bound to the suite work directory.
pub struct AppUnderTest<'a> {
    config: &'a SuiteConfig,
    pub name: String,
    work_dir: PathBuf,
    activity_settle: Duration,
}

impl<'a> AppUnderTest<'a> {
    pub fn new(config: &'a SuiteConfig, name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            name: name.into(),
            work_dir: work_dir.into(),
            activity_settle: ACTIVITY_SETTLE_DELAY,
        }
    }

    /// Override the activity settling delay (hermetic tests pass zero).
    #[must_use]
    pub fn with_activity_settle(mut self, delay: Duration) -> Self {
        self.activity_settle = delay;
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        self.config
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Directory holding this application's cloned source tree.
    pub fn app_dir(&self) -> PathBuf {
        self.work_dir.join(&self.name)
    }

    /// Runner for the CLI under test in the suite work directory.
    pub fn runner(&self) -> CliRunner {
        CliRunner::new(self.config, &self.work_dir)
    }

    /// The `{owner}/{name}/{branch}` job identifier for this application.
    pub fn job_name(&self, branch: &str) -> String {
        format!("{}/{}/{}", self.config.git_organisation, self.name, branch)
    }

    /// Assert the application is deployed and answering in staging.
    pub fn running_in_staging(&self, expected_status: u16) -> Result<(), StepError> {
        self.running_in("staging", expected_status)
    }

    /// Assert the application is deployed and answering in production.
    pub fn running_in_production(&self, expected_status: u16) -> Result<(), StepError> {
        self.running_in("production", expected_status)
    }

    /// Assert the application is deployed into `environment` and its URL
    /// returns `expected_status`.
    ///
    /// List-and-locate runs under the build-running-in-staging budget; the
    /// URL probe has its own url-returns budget.
    pub fn running_in(&self, environment: &str, expected_status: u16) -> Result<(), StepError> {
        let runner = self.runner();
        let args = ["get", "applications", "-e", environment];
        info!(
            application = %self.name,
            environment,
            "waiting for the application to be listed with a URL"
        );

        let url = retry_until(
            self.config.timeouts.build_running_in_staging,
            &BackoffPolicy::slow(),
            || {
                let out = runner.run_with_output(args)?;
                let applications = parsers::parse_applications(&out)?;
                if applications.is_empty() {
                    return Err(StepError::NoApplications {
                        environment: environment.to_string(),
                    });
                }
                let application = locate_application(&self.name, &applications).ok_or_else(|| {
                    StepError::ApplicationNotFound {
                        name: self.name.clone(),
                        environment: environment.to_string(),
                    }
                })?;
                if application.url.is_empty() {
                    return Err(StepError::MissingUrl {
                        name: application.name.clone(),
                        environment: environment.to_string(),
                    });
                }
                Ok(application.url.clone())
            },
        )
        .map_err(StepError::from_retry)?;

        info!(application = %self.name, url = %url, "application listed; probing URL");
        self.expect_url_returns(&url, expected_status, self.config.timeouts.url_returns)
    }

    /// Assert that `url` returns `expected_status` within `budget`.
    pub fn expect_url_returns(
        &self,
        url: &str,
        expected_status: u16,
        budget: Duration,
    ) -> Result<(), StepError> {
        let probe = UrlProbe::new(expected_status, self.config.insecure_skip_verify);
        let mut state = ProbeState::default();
        retry_until(budget, &BackoffPolicy::slow(), || {
            probe.check(url, &mut state).map_err(StepError::from)
        })
        .map_err(StepError::from_retry)
    }

    /// Tail the build log of `job` until it finishes, bounded by `budget`.
    /// A `build` of zero means the latest build.
    pub fn tail_build_log(&self, job: &str, build: u32, budget: Duration) -> Result<(), StepError> {
        let mut args = vec![
            "get".to_string(),
            "build".to_string(),
            "logs".to_string(),
            "--wait".to_string(),
            job.to_string(),
        ];
        if build != 0 {
            args.push("--build".to_string());
            args.push(build.to_string());
        }
        info!(job, "tailing build log");
        self.runner().with_timeout(budget).run(args)?;
        Ok(())
    }

    /// Assert that `job` completes successfully within `budget`, returning
    /// the build number the activity was recorded under.
    pub fn job_completes_successfully(&self, job: &str, budget: Duration) -> Result<u32, StepError> {
        self.tail_build_log(job, 0, budget)?;

        if !self.activity_settle.is_zero() {
            debug!(
                settle_secs = self.activity_settle.as_secs(),
                "letting the activity record settle"
            );
            thread::sleep(self.activity_settle);
        }

        let runner = self.runner();
        let args = ["get", "activities", "--filter", job];
        let activities = retry_until(
            self.config.timeouts.pipeline_activity_complete,
            &BackoffPolicy::slow(),
            || {
                let out = runner.run_with_output(args)?;
                let activities = parsers::parse_activities(&out)?;
                if activities.is_empty() {
                    return Err(StepError::NoActivities {
                        job: job.to_string(),
                    });
                }
                Ok(activities)
            },
        )
        .map_err(StepError::from_retry)?;

        let (build, activity) = select_build(job, &activities)?;
        info!(job, build, status = %activity.status, "pipeline activity status");
        ensure_healthy_status(job, activity)?;
        Ok(build)
    }

    /// Assert a preview environment exists for `pull_request` and answers
    /// with `expected_status`.
    pub fn preview_ready(
        &self,
        pull_request: &CreatePullRequest,
        expected_status: u16,
    ) -> Result<(), StepError> {
        let runner = CliRunner::new(self.config, self.app_dir());
        info!(pull_request = %pull_request.url, "waiting for the preview environment");

        retry_until(
            self.config.timeouts.preview_url_returns,
            &BackoffPolicy::slow(),
            || {
                let out = runner.run_with_output(["get", "previews"])?;
                let previews = parsers::parse_previews(&out)?;
                let url = preview_url(&previews, &pull_request.url).ok_or_else(|| {
                    StepError::PreviewNotFound {
                        pull_request: pull_request.url.clone(),
                    }
                })?;
                info!(pull_request = %pull_request.url, url = %url, "preview application URL");
                self.expect_url_returns(&url, expected_status, self.config.timeouts.url_returns)
            },
        )
        .map_err(StepError::from_retry)
    }

    /// Wait for a deployment rollout to finish.
    pub fn wait_for_rollout(&self, deployment: &str) -> Result<(), StepError> {
        let target = format!("deployment/{deployment}");
        CliRunner::for_binary(
            "kubectl",
            &self.work_dir,
            self.config.timeouts.deployment_rollout,
        )
        .run(["rollout", "status", "-w", target.as_str()])?;
        Ok(())
    }

    /// Fetch the pull-request title recorded on the PipelineActivity.
    pub fn pull_title_from_activity(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        build: u32,
    ) -> Result<String, StepError> {
        let activity = format!("{owner}-{repo}-{branch}-{build}");
        let out = CliRunner::for_binary("kubectl", &self.work_dir, self.config.timeouts.cmd_line)
            .run_with_output([
                "get",
                "pipelineactivity",
                activity.as_str(),
                "-o=jsonpath='{.spec.pullTitle}'",
            ])?;
        Ok(out.trim_matches('\'').to_string())
    }
}

/// Locate an application by name, falling back to the `jx-`-prefixed
/// variant some build packs produce.
fn locate_application<'m>(
    name: &str,
    applications: &'m HashMap<String, Application>,
) -> Option<&'m Application> {
    applications
        .get(name)
        .or_else(|| applications.get(&format!("jx-{name}")))
}

/// Pick the activity for `job`, preferring build 1 and falling back to
/// build 2. The fallback compensates for an upstream renumbering quirk; it
/// is deliberately not generalized beyond those two numbers.
fn select_build<'m>(
    job: &str,
    activities: &'m HashMap<String, Activity>,
) -> Result<(u32, &'m Activity), StepError> {
    if activities.len() != 1 {
        return Err(StepError::AmbiguousActivity {
            job: job.to_string(),
            count: activities.len(),
        });
    }
    if let Some(activity) = activities.get(&format!("{job} #1")) {
        Ok((1, activity))
    } else if let Some(activity) = activities.get(&format!("{job} #2")) {
        Ok((2, activity))
    } else {
        Err(StepError::ActivityNotFound {
            job: job.to_string(),
        })
    }
}

/// A build is healthy while Running and done once Succeeded; anything else
/// is terminal and fails the wait immediately.
fn ensure_healthy_status(job: &str, activity: &Activity) -> Result<(), StepError> {
    if activity.status.starts_with("Succeeded") || activity.status.starts_with("Running") {
        Ok(())
    } else {
        Err(StepError::PipelineFailed {
            job: job.to_string(),
            status: activity.status.clone(),
        })
    }
}

/// Resolve a preview application URL by exact pull-request URL, falling back
/// to a match on the PR's trailing numeric path segment for providers that
/// rewrite URLs.
fn preview_url(previews: &HashMap<String, Preview>, pr_url: &str) -> Option<String> {
    if let Some(preview) = previews.get(pr_url)
        && !preview.url.is_empty()
    {
        return Some(preview.url.clone());
    }

    let suffix = pr_url.rfind('/').map(|idx| &pr_url[idx..])?;
    previews.iter().find_map(|(key, preview)| {
        (key.ends_with(suffix) && !preview.url.is_empty()).then(|| preview.url.clone())
    })
}

/// Poll a pull request with `fetch` until `matches` accepts it.
///
/// The fetch closure stands in for whichever provider client the suite is
/// wired to; this crate deliberately has no provider API dependency.
pub fn wait_for_pull_request<T, F, M>(
    budget: Duration,
    mut fetch: F,
    mut matches: M,
) -> Result<(), StepError>
where
    F: FnMut() -> Result<T, StepError>,
    M: FnMut(&T) -> Result<(), String>,
{
    retry_until(budget, &BackoffPolicy::fast(), || {
        let pull_request = fetch()?;
        matches(&pull_request).map_err(StepError::PullRequestMismatch)
    })
    .map_err(StepError::from_retry)
}

/// Wait until the pull request carries `label`.
pub fn pull_request_has_label<F>(budget: Duration, fetch_labels: F, label: &str) -> Result<(), StepError>
where
    F: FnMut() -> Result<Vec<String>, StepError>,
{
    wait_for_pull_request(budget, fetch_labels, |labels: &Vec<String>| {
        if labels.is_empty() {
            return Err("the pull request has no labels".to_string());
        }
        if labels.iter().any(|candidate| candidate == label) {
            Ok(())
        } else {
            Err(format!("the pull request does not have the label {label}"))
        }
    })
}

/// Wait until the pull request no longer carries `label`.
pub fn pull_request_lacks_label<F>(
    budget: Duration,
    fetch_labels: F,
    label: &str,
) -> Result<(), StepError>
where
    F: FnMut() -> Result<Vec<String>, StepError>,
{
    wait_for_pull_request(budget, fetch_labels, |labels: &Vec<String>| {
        if labels.iter().any(|candidate| candidate == label) {
            Err(format!("the pull request still has the label {label}"))
        } else {
            Ok(())
        }
    })
}

/// The git provider URL for this run: the configured value when set, or the
/// first server reported by `jx get gitserver` when explicitly blank.
pub fn git_provider_url(config: &SuiteConfig, work_dir: &Path) -> Result<String, StepError> {
    if !config.git_provider_url.trim().is_empty() {
        return Ok(config.git_provider_url.clone());
    }
    let out = CliRunner::new(config, work_dir).run_with_output(["get", "gitserver"])?;
    let servers = parsers::parse_git_servers(&out)?;
    servers
        .first()
        .map(|server| server.url.clone())
        .ok_or(StepError::NoGitServer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn application(name: &str, url: &str) -> Application {
        Application {
            name: name.to_string(),
            version: "0.0.1".to_string(),
            desired_pods: 1,
            running_pods: 1,
            url: url.to_string(),
        }
    }

    fn activity(job: &str, build: u32, status: &str) -> (String, Activity) {
        (
            format!("{job} #{build}"),
            Activity {
                job: job.to_string(),
                build,
                started: "1m0s".to_string(),
                duration: "30s".to_string(),
                status: status.to_string(),
            },
        )
    }

    #[test]
    fn locate_application_falls_back_to_the_jx_prefix() {
        let mut applications = HashMap::new();
        applications.insert(
            "jx-myapp".to_string(),
            application("jx-myapp", "http://myapp.example"),
        );

        let found = locate_application("myapp", &applications).unwrap();
        assert_eq!(found.name, "jx-myapp");
        assert!(locate_application("other", &applications).is_none());
    }

    #[test]
    fn select_build_prefers_build_one() {
        let job = "acme/app/master";
        let activities: HashMap<_, _> =
            [activity(job, 1, "Succeeded Version: 0.0.1")].into_iter().collect();

        let (build, selected) = select_build(job, &activities).unwrap();
        assert_eq!(build, 1);
        assert!(selected.status.starts_with("Succeeded"));
    }

    #[test]
    fn select_build_falls_back_to_build_two() {
        let job = "acme/app/master";
        let activities: HashMap<_, _> = [activity(job, 2, "Running")].into_iter().collect();

        let (build, _) = select_build(job, &activities).unwrap();
        assert_eq!(build, 2);
    }

    #[test]
    fn select_build_rejects_build_three() {
        let job = "acme/app/master";
        let activities: HashMap<_, _> = [activity(job, 3, "Running")].into_iter().collect();

        let err = select_build(job, &activities).unwrap_err();
        assert!(matches!(err, StepError::ActivityNotFound { .. }));
    }

    #[test]
    fn select_build_requires_exactly_one_activity() {
        let job = "acme/app/master";
        let activities: HashMap<_, _> = [
            activity(job, 1, "Succeeded"),
            activity(job, 2, "Running"),
        ]
        .into_iter()
        .collect();

        let err = select_build(job, &activities).unwrap_err();
        assert!(matches!(err, StepError::AmbiguousActivity { count: 2, .. }));
    }

    #[test]
    fn terminal_status_is_fatal_not_retryable() {
        let (_, failed) = activity("acme/app/master", 1, "Failed");
        let err = ensure_healthy_status("acme/app/master", &failed).unwrap_err();
        assert!(!err.is_retryable());

        let (_, running) = activity("acme/app/master", 1, "Running");
        ensure_healthy_status("acme/app/master", &running).unwrap();
    }

    #[test]
    fn preview_url_prefers_the_exact_key() {
        let mut previews = HashMap::new();
        previews.insert(
            "https://github.com/acme/app/pull/3".to_string(),
            Preview {
                namespace: "jx-acme-app-pr-3".to_string(),
                url: "http://exact.example".to_string(),
            },
        );

        let url = preview_url(&previews, "https://github.com/acme/app/pull/3").unwrap();
        assert_eq!(url, "http://exact.example");
    }

    #[test]
    fn preview_url_falls_back_to_the_numeric_suffix() {
        let mut previews = HashMap::new();
        previews.insert(
            "https://git.internal.acme.dev/acme/app/-/merge_requests/3".to_string(),
            Preview {
                namespace: "jx-acme-app-pr-3".to_string(),
                url: "http://rewritten.example".to_string(),
            },
        );

        let url = preview_url(&previews, "https://github.com/acme/app/pull/3").unwrap();
        assert_eq!(url, "http://rewritten.example");
    }

    #[test]
    fn preview_url_ignores_entries_without_a_url() {
        let mut previews = HashMap::new();
        previews.insert(
            "https://github.com/acme/app/pull/3".to_string(),
            Preview {
                namespace: "jx-acme-app-pr-3".to_string(),
                url: String::new(),
            },
        );

        assert!(preview_url(&previews, "https://github.com/acme/app/pull/3").is_none());
    }

    #[test]
    fn label_wait_converges_once_the_label_appears() {
        let calls = Cell::new(0u32);
        pull_request_has_label(
            Duration::from_secs(10),
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Ok(vec![])
                } else {
                    Ok(vec!["approved".to_string()])
                }
            },
            "approved",
        )
        .unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn label_removal_wait_converges_once_the_label_is_gone() {
        let calls = Cell::new(0u32);
        pull_request_lacks_label(
            Duration::from_secs(10),
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 2 {
                    Ok(vec!["do-not-merge/hold".to_string()])
                } else {
                    Ok(vec![])
                }
            },
            "do-not-merge/hold",
        )
        .unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn label_wait_exhaustion_reports_a_timeout() {
        let err = pull_request_has_label(
            Duration::from_millis(10),
            || Ok(vec![]),
            "approved",
        )
        .unwrap_err();
        assert!(matches!(err, StepError::Timeout { .. }));
    }
}
