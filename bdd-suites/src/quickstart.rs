//! Quickstart lifecycle steps: create, first release, preview, cleanup.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::info;

use bdd_common::convergence::git_provider_url;
use bdd_common::{AppUnderTest, CliRunner, StepError, SuiteConfig};

use crate::pull_request;

/// Quickstarts exercised by the default suite.
pub const INCLUDED_QUICKSTARTS: &[&str] = &[
    "node-http",
    "spring-boot-rest-prometheus-java11",
    "spring-boot-http-gradle",
    "golang-http",
];

/// Creation returns slightly before the build log is available.
const FIRST_BUILD_SETTLE: Duration = Duration::from_secs(30);

/// Abbreviate a quickstart name to its hyphen-part initials
/// (`node-http` -> `nh`), keeping generated application names short.
pub fn quickstart_abbreviation(name: &str) -> String {
    name.split('-')
        .filter_map(|part| part.chars().next())
        .collect()
}

/// Arguments for `jx create quickstart`.
fn create_args(
    config: &SuiteConfig,
    application: &str,
    quickstart: &str,
    provider_url: &str,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "create",
        "quickstart",
        "-b",
        "--org",
        config.git_organisation.as_str(),
        "-p",
        application,
        "-f",
        quickstart,
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    if !provider_url.is_empty() {
        args.push("--git-provider-url".to_string());
        args.push(provider_url.to_string());
    }
    if !config.git_kind.is_empty() {
        args.push("--git-kind".to_string());
        args.push(config.git_kind.clone());
    }
    args
}

/// Create a quickstart and follow it through its first release, preview
/// environment, and cleanup — the full happy path of the default suite.
pub fn create_and_promote(
    config: &SuiteConfig,
    work_dir: &Path,
    quickstart: &str,
    application: &str,
) -> Result<(), StepError> {
    let app = AppUnderTest::new(config, application, work_dir);
    let runner = app.runner();

    let provider_url = git_provider_url(config, work_dir)?;
    info!(quickstart, application, provider_url = %provider_url, "creating quickstart");
    runner.run(create_args(config, application, quickstart, &provider_url))?;

    let branch = crate::default_branch(config, work_dir);
    let job = app.job_name(&branch);

    if config.wait_for_first_release {
        thread::sleep(FIRST_BUILD_SETTLE);
        app.job_completes_successfully(&job, config.timeouts.build_completes)?;
        app.running_in_staging(200)?;
    } else {
        app.job_completes_successfully(&job, config.timeouts.build_completes)?;
    }

    if config.delete_applications {
        info!(application, "deleting the application");
        runner.run(["application", "delete", "--no-source", "--repo", application])?;
    }

    if config.test_pull_request {
        pull_request::create_pull_request_and_check_preview(config, work_dir, application, 200)?;
    }

    if config.delete_repos {
        info!(application, "deleting the repository");
        runner.run([
            "delete",
            "repo",
            "-b",
            "--github",
            "-o",
            config.git_organisation.as_str(),
            "-n",
            application,
        ])?;
    }

    Ok(())
}

/// Creation without a project name must exit with status 1.
pub fn create_without_project_name_fails(
    config: &SuiteConfig,
    work_dir: &Path,
    quickstart: &str,
) -> Result<(), StepError> {
    CliRunner::new(config, work_dir).with_expected_exit(1).run([
        "create",
        "quickstart",
        "-b",
        "--org",
        config.git_organisation.as_str(),
        "-f",
        quickstart,
    ])?;
    Ok(())
}

/// Creation with a filter matching no quickstart must exit with status 1.
pub fn create_with_unmatched_filter_fails(
    config: &SuiteConfig,
    work_dir: &Path,
    application: &str,
) -> Result<(), StepError> {
    CliRunner::new(config, work_dir).with_expected_exit(1).run([
        "create",
        "quickstart",
        "-b",
        "--org",
        config.git_organisation.as_str(),
        "-p",
        application,
        "-f",
        "the_derek_zoolander_app_for_being_really_really_good_looking",
    ])?;
    Ok(())
}
