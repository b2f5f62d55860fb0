//! Scenario suites driving the platform CLI end to end.
//!
//! Each module holds the steps for one lifecycle (quickstart, Spring
//! project, pull request); the cluster-gated integration tests under
//! `tests/` sequence them into suites. Without `BDD_E2E` set, the suites
//! skip so a plain `cargo test` stays hermetic.

use std::path::Path;

use bdd_common::{CliRunner, SuiteConfig};

pub mod pull_request;
pub mod quickstart;
pub mod spring;

/// Whether the cluster-backed suites should run.
pub fn live_cluster_enabled() -> bool {
    matches!(
        std::env::var("BDD_E2E").as_deref().map(str::to_lowercase).as_deref(),
        Ok("1") | Ok("true") | Ok("on")
    )
}

/// The default branch new repositories are created with: the operator's
/// global git configuration, or `master` when unset.
pub fn default_branch(config: &SuiteConfig, work_dir: &Path) -> String {
    let runner = CliRunner::for_binary("git", work_dir, config.timeouts.cmd_line);
    match runner.run_with_output(["config", "--global", "--get", "init.defaultBranch"]) {
        Ok(branch) if !branch.trim().is_empty() => branch.trim().to_string(),
        _ => "master".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_cluster_gate_defaults_off() {
        // BDD_E2E is never set during unit test runs.
        assert!(!live_cluster_enabled());
    }

    #[test]
    fn default_branch_is_never_empty() {
        let dir = std::env::temp_dir();
        let config = SuiteConfig::for_tests("jx", &dir);
        assert!(!default_branch(&config, &dir).is_empty());
    }
}
