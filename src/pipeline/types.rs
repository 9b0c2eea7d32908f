//! Core types for the batch job
//!
//! Stage identifiers, per-stage outcomes and the report a run returns.

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of the batch and packaging jobs, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Resolve configuration and select the platform
    Init,
    /// Recreate the workspace root
    WorkspacePrep,
    /// Platform `pre` hook
    PlatformPre,
    /// Platform `show_env` hook
    EnvDiagnostics,
    /// Install the virtualenv tool
    PrereqInstall,
    /// Create and enter the isolated environment
    EnvActivation,
    /// Upgrade pip and setuptools
    ToolchainUpdate,
    /// Install auxiliary Python tooling
    DependencyInstall,
    /// Download the repository manifest
    ManifestFetch,
    /// Import repositories into the source space
    SourceCheckout,
    /// Switch repositories to the test branch
    BranchOverride,
    /// Print the latest commit of every repository
    RevisionLog,
    /// Platform `setup_env` hook
    PlatformSetupEnv,
    /// Build and install
    Build,
    /// Run tests
    Test,
    /// Aggregate test results
    ResultsCollection,
    /// Release build of the main tree
    PackageBuild,
    /// Serial build of the ROS 1 bridge
    BridgeBuild,
    /// Remove unwanted executables from the install space
    PruneExecutables,
    /// Write the package archive
    Archive,
}

impl Stage {
    /// Stage name as shown in logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::WorkspacePrep => "workspace_prep",
            Self::PlatformPre => "platform_pre",
            Self::EnvDiagnostics => "env_diagnostics",
            Self::PrereqInstall => "prereq_install",
            Self::EnvActivation => "env_activation",
            Self::ToolchainUpdate => "toolchain_update",
            Self::DependencyInstall => "dependency_install",
            Self::ManifestFetch => "manifest_fetch",
            Self::SourceCheckout => "source_checkout",
            Self::BranchOverride => "branch_override",
            Self::RevisionLog => "revision_log",
            Self::PlatformSetupEnv => "platform_setup_env",
            Self::Build => "build",
            Self::Test => "test",
            Self::ResultsCollection => "results_collection",
            Self::PackageBuild => "package_build",
            Self::BridgeBuild => "bridge_build",
            Self::PruneExecutables => "prune_executables",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Possible outcomes of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageResult {
    /// Stage completed successfully
    Success,
    /// Stage failed fatally; the run stopped here
    Failure,
    /// Stage failed softly; the run continued
    Unstable,
    /// Stage was skipped by configuration or platform policy
    Skipped,
}

impl StageResult {
    /// Returns true if result is successful
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if result is a failure
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Returns true if result is unstable
    #[must_use]
    pub fn is_unstable(&self) -> bool {
        matches!(self, Self::Unstable)
    }

    /// Returns true if result is skipped
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Classifies the exit code of a soft stage
    pub fn from_soft_exit(code: i32) -> Self {
        if code == 0 { Self::Success } else { Self::Unstable }
    }
}

impl fmt::Display for StageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
            Self::Unstable => write!(f, "UNSTABLE"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Which stage
    pub stage: Stage,
    /// How it ended
    pub result: StageResult,
    /// Exit code of the stage's deciding command, if it ran one
    pub exit_code: Option<i32>,
}

/// What a completed run hands back to its caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Stage outcomes in execution order
    pub stages: Vec<StageRecord>,
    /// Archive written by the packaging job
    pub archive: Option<std::path::PathBuf>,
    /// Exit code the process should end with
    pub exit_code: i32,
}

impl BatchReport {
    pub(crate) fn record(&mut self, stage: Stage, result: StageResult, exit_code: Option<i32>) {
        tracing::info!(stage = %stage, result = %result, exit_code = ?exit_code, "Stage completed");
        self.stages.push(StageRecord {
            stage,
            result,
            exit_code,
        });
    }

    /// Outcome recorded for `stage`
    pub fn get(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Stages that ended unstable
    pub fn unstable(&self) -> impl Iterator<Item = &StageRecord> {
        self.stages.iter().filter(|r| r.result.is_unstable())
    }

    /// Human-readable summary table
    pub fn summary(&self) -> String {
        let mut out = String::from("Batch job summary:\n");
        for record in &self.stages {
            let code = record
                .exit_code
                .map_or_else(String::new, |c| format!(" (exit code {c})"));
            out.push_str(&format!("  {:<20} {}{}\n", record.stage, record.result, code));
        }
        if let Some(archive) = &self.archive {
            out.push_str(&format!("  archive: {}\n", archive.display()));
        }
        let count = |matches: fn(&StageResult) -> bool| {
            self.stages.iter().filter(|r| matches(&r.result)).count()
        };
        out.push_str(&format!(
            "  {} succeeded, {} unstable, {} failed, {} skipped\n",
            count(StageResult::is_success),
            count(StageResult::is_unstable),
            count(StageResult::is_failure),
            count(StageResult::is_skipped),
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_predicates() {
        assert!(StageResult::Success.is_success());
        assert!(StageResult::Failure.is_failure());
        assert!(StageResult::Unstable.is_unstable());
        assert!(StageResult::Skipped.is_skipped());
        assert!(!StageResult::Unstable.is_failure());
    }

    #[test]
    fn test_stage_result_display() {
        assert_eq!(StageResult::Success.to_string(), "SUCCESS");
        assert_eq!(StageResult::Failure.to_string(), "FAILURE");
        assert_eq!(StageResult::Unstable.to_string(), "UNSTABLE");
        assert_eq!(StageResult::Skipped.to_string(), "SKIPPED");
    }

    #[test]
    fn test_soft_exit_classification() {
        assert_eq!(StageResult::from_soft_exit(0), StageResult::Success);
        assert_eq!(StageResult::from_soft_exit(1), StageResult::Unstable);
        assert_eq!(StageResult::from_soft_exit(-1), StageResult::Unstable);
    }

    #[test]
    fn test_stage_serialize() {
        let json = serde_json::to_string(&Stage::ResultsCollection).unwrap();
        assert_eq!(json, r#""results_collection""#);
        assert_eq!(Stage::ResultsCollection.to_string(), "results_collection");
    }

    #[test]
    fn test_report_summary_lists_unstable_stages() {
        let mut report = BatchReport::default();
        report.record(Stage::Build, StageResult::Unstable, Some(2));
        report.record(Stage::Test, StageResult::Success, Some(0));
        report.record(Stage::BranchOverride, StageResult::Skipped, None);

        assert_eq!(report.unstable().count(), 1);
        assert_eq!(report.get(Stage::Build).and_then(|r| r.exit_code), Some(2));
        let summary = report.summary();
        assert!(summary.contains("build"));
        assert!(summary.contains("UNSTABLE (exit code 2)"));
        assert!(summary.ends_with("1 succeeded, 1 unstable, 0 failed, 1 skipped\n"));
    }
}
