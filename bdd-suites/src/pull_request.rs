//! Pull-request flow: local change, PR creation, preview environment.

use std::fs;
use std::path::Path;

use tracing::info;

use bdd_common::parsers::{CreatePullRequest, parse_create_pull_request};
use bdd_common::{AppUnderTest, CliRunner, StepError, SuiteConfig};

/// Title used for the suite's pull requests; also verified against the
/// PipelineActivity record.
pub const PR_TITLE: &str = "My First PR commit";

/// Commit a local change on a fresh branch and open a pull request for it,
/// returning the parsed pull-request reference.
///
/// `make_change` mutates the checked-out application source; the commit
/// picks up whatever it modified.
pub fn create_pull_request_with_local_change<F>(
    config: &SuiteConfig,
    work_dir: &Path,
    application: &str,
    title: &str,
    make_change: F,
) -> Result<CreatePullRequest, StepError>
where
    F: FnOnce(&Path) -> Result<(), StepError>,
{
    let app_dir = work_dir.join(application);
    let branch = format!("changes-{:x}", rand::random::<u32>());
    let git = CliRunner::for_binary("git", &app_dir, config.timeouts.cmd_line);

    info!(application, branch = %branch, "creating a pull request branch");
    git.run(["checkout", "-b", branch.as_str()])?;
    make_change(&app_dir)?;
    git.run(["commit", "-a", "-m", title])?;
    git.run(["push", "--set-upstream", "origin", branch.as_str()])?;

    let out = CliRunner::new(config, &app_dir).run_with_output_no_timeout([
        "create",
        "pullrequest",
        "-b",
        "--title",
        title,
        "--body",
        "PR comments",
    ])?;
    let pull_request = parse_create_pull_request(&out)?;
    info!(url = %pull_request.url, number = pull_request.number, "created pull request");
    Ok(pull_request)
}

/// Open a pull request with a README change, wait for its job to go green,
/// verify the PipelineActivity title when enabled, and assert the preview
/// environment answers with `expected_status`.
pub fn create_pull_request_and_check_preview(
    config: &SuiteConfig,
    work_dir: &Path,
    application: &str,
    expected_status: u16,
) -> Result<(), StepError> {
    let pull_request =
        create_pull_request_with_local_change(config, work_dir, application, PR_TITLE, |app_dir| {
            fs::write(app_dir.join("README.md"), "My First PR\n")?;
            Ok(())
        })?;

    let app = AppUnderTest::new(config, application, work_dir);
    let job = app.job_name(&format!("PR-{}", pull_request.number));
    let build = app.job_completes_successfully(&job, config.timeouts.build_completes)?;

    if config.pipeline_activity_check {
        let pull_title = app.pull_title_from_activity(
            &config.git_organisation,
            application,
            &format!("pr-{}", pull_request.number),
            build,
        )?;
        if pull_title != PR_TITLE {
            return Err(StepError::PullRequestMismatch(format!(
                "expected PipelineActivity pull title '{PR_TITLE}', got '{pull_title}'"
            )));
        }
    }

    app.preview_ready(&pull_request, expected_status)
}
