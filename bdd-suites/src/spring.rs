//! Spring project lifecycle steps: create, first release, preview, manual
//! promotion to production, cleanup.
//!
//! A freshly generated Spring application serves nothing at `/`, so the
//! expected status for its URLs is 404 throughout.

use std::env;
use std::path::Path;

use tracing::info;

use bdd_common::convergence::git_provider_url;
use bdd_common::{AppUnderTest, StepError, SuiteConfig};

use crate::pull_request;

/// Expected status for a generated Spring application.
const SPRING_STATUS: u16 = 404;

/// Java version and project type for `jx project spring`.
#[derive(Debug, Clone)]
pub struct SpringOptions {
    pub java_version: String,
    pub project_type: String,
}

impl SpringOptions {
    /// Options from the environment: `JAVA_VERSION` (default 17) and the
    /// maven project type.
    pub fn from_env() -> Self {
        Self {
            java_version: env::var("JAVA_VERSION").unwrap_or_else(|_| "17".to_string()),
            project_type: "maven-project".to_string(),
        }
    }
}

fn create_args(
    config: &SuiteConfig,
    application: &str,
    options: &SpringOptions,
    provider_url: &str,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "project",
        "spring",
        "-b",
        "--org",
        config.git_organisation.as_str(),
        "--artifact",
        application,
        "--name",
        application,
        "-j",
        options.java_version.as_str(),
        "-d",
        "web",
        "-d",
        "actuator",
        "--type",
        options.project_type.as_str(),
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

/// Create a Spring application and follow it to staging, through a preview,
/// and manually into production.
pub fn create_and_promote(
    config: &SuiteConfig,
    work_dir: &Path,
    application: &str,
    options: &SpringOptions,
) -> Result<(), StepError> {
    let app = AppUnderTest::new(config, application, work_dir);
    let runner = app.runner();

    let provider_url = git_provider_url(config, work_dir)?;
    info!(
        application,
        java_version = %options.java_version,
        "creating spring application"
    );
    runner.run(create_args(config, application, options, &provider_url))?;

    if config.wait_for_first_release {
        let branch = crate::default_branch(config, work_dir);
        let job = app.job_name(&branch);
        app.job_completes_successfully(&job, config.timeouts.build_completes)?;
        app.running_in_staging(SPRING_STATUS)?;
    }

    if config.test_pull_request {
        pull_request::create_pull_request_and_check_preview(
            config,
            work_dir,
            application,
            SPRING_STATUS,
        )?;
    }

    if skip_manual_promotion() {
        info!("manual promotion skipped by JX_BDD_SKIP_MANUAL_PROMOTION");
    } else {
        info!(application, "promoting to production");
        runner.run(["promote", "--env", "production", "--version", "0.0.1", application])?;
        app.running_in_production(SPRING_STATUS)?;
    }

    if config.delete_applications {
        runner.run(["delete", "application", "-b", application])?;
    }

    if config.delete_repos {
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

fn skip_manual_promotion() -> bool {
    env::var("JX_BDD_SKIP_MANUAL_PROMOTION")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_args_carry_java_version_and_dependencies() {
        let config = SuiteConfig::for_tests("jx", "/tmp");
        let options = SpringOptions {
            java_version: "17".to_string(),
            project_type: "maven-project".to_string(),
        };
        let args = create_args(&config, "bdd-spring-1617112975", &options, "https://github.com");

        assert_eq!(args[0..2], ["project", "spring"]);
        assert!(args.windows(2).any(|w| w[0] == "-j" && w[1] == "17"));
        assert!(args.windows(2).any(|w| w[0] == "-d" && w[1] == "web"));
        assert!(args.windows(2).any(|w| w[0] == "-d" && w[1] == "actuator"));
        assert!(args.windows(2).any(|w| w[0] == "--type" && w[1] == "maven-project"));
        assert!(args.contains(&"--git-provider-url".to_string()));
    }

    #[test]
    fn spring_options_default_to_java_17() {
        // JAVA_VERSION is not set during unit test runs.
        let options = SpringOptions::from_env();
        assert_eq!(options.java_version, "17");
        assert_eq!(options.project_type, "maven-project");
    }
}
