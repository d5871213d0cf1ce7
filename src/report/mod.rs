//! Run reports
//!
//! Every run that gets as far as resolving its environment ends with a JSON
//! report, whether it succeeded, had failed items or was aborted.

pub mod notifier;

pub use notifier::{Delivery, Notifier};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::import::error::RunError;
use crate::import::model::{Environment, OperationResult, RunStamp, Summary};
use crate::import::validator::OperationKind;
use crate::import::{EXIT_FAILED, EXIT_SUCCESS};
use crate::orchestrator::Stage;
use crate::state::{StateSnapshot, Verification};
use crate::traits::{FileSystem, Output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        }
    }
}

/// Fatal error as recorded in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&RunError> for ErrorInfo {
    fn from(err: &RunError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub operation: OperationKind,
    pub environment: Environment,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    pub triggered_by: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_stage: Stage,
    /// Stage that was running when the run aborted
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aborted_at: Option<Stage>,
    pub status: RunStatus,
    pub exit_code: i32,
    pub summary: Summary,
    pub results: Vec<OperationResult>,
    pub snapshot: Option<StateSnapshot>,
    pub verification: Option<Verification>,
    pub error: Option<ErrorInfo>,
}

/// Fold a run's results and fatal error into its exit code
pub fn exit_code(summary: &Summary, fatal: Option<&RunError>) -> i32 {
    match fatal {
        Some(err) => err.exit_code(),
        None if summary.failed > 0 => EXIT_FAILED,
        None => EXIT_SUCCESS,
    }
}

fn current_user() -> String {
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", whoami::username(), hostname)
}

impl RunReport {
    /// Assemble the final report; `final_stage` is `Aborted` when `fatal` is set
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        operation: OperationKind,
        environment: Environment,
        stamp: &RunStamp,
        description: Option<String>,
        results: Vec<OperationResult>,
        snapshot: Option<StateSnapshot>,
        verification: Option<Verification>,
        fatal: Option<&RunError>,
    ) -> Self {
        let summary = Summary::from_results(&results);
        let exit_code = exit_code(&summary, fatal);
        let status = match (fatal, summary.failed) {
            (Some(_), _) => RunStatus::Aborted,
            (None, 0) => RunStatus::Success,
            (None, _) => RunStatus::Failed,
        };

        Self {
            operation,
            environment,
            run_id: stamp.run_id.clone(),
            description,
            triggered_by: current_user(),
            started_at: stamp.started_at,
            finished_at: Utc::now(),
            final_stage: if fatal.is_some() { Stage::Aborted } else { Stage::Done },
            aborted_at: None,
            status,
            exit_code,
            summary,
            results,
            snapshot,
            verification,
            error: fatal.map(ErrorInfo::from),
        }
    }

    /// One-line human summary, also used as the notification message
    pub fn headline(&self) -> String {
        match &self.error {
            Some(error) => format!(
                "{} on {} aborted: {}",
                self.operation, self.environment, error.message
            ),
            None => format!(
                "{} on {} {}: {} succeeded, {} failed, {} skipped",
                self.operation,
                self.environment,
                if self.status == RunStatus::Success {
                    "completed"
                } else {
                    "completed with failures"
                },
                self.summary.successful,
                self.summary.failed,
                self.summary.skipped
            ),
        }
    }

    pub fn render(&self, output: &dyn Output) {
        output.section("Run Report");
        output.key_value("Operation", self.operation.as_str());
        output.key_value("Environment", self.environment.as_str());
        output.key_value("Run ID", &self.run_id);
        output.key_value("Status", self.status.as_str());

        if !self.results.is_empty() {
            output.subsection("Results");
            for result in &self.results {
                output.key_value(&result.address, result.outcome.label());
            }
        }

        output.subsection("Summary");
        output.key_value("Successful", &self.summary.successful.to_string());
        output.key_value("Failed", &self.summary.failed.to_string());
        output.key_value("Skipped", &self.summary.skipped.to_string());

        if let Some(snapshot) = &self.snapshot {
            output.key_value("Snapshot", &snapshot.path.display().to_string());
        }

        match &self.verification {
            Some(Verification::Clean) => output.success("Verification: no pending changes"),
            Some(Verification::Divergence { summary, plan_file }) => output.warning(&format!(
                "Verification: configuration and state diverge ({}); plan saved to {}",
                summary.as_deref().unwrap_or("see plan"),
                plan_file.display()
            )),
            None => {}
        }

        if let Some(error) = &self.error {
            let stage = self.aborted_at.map(|s| format!(" during {}", s)).unwrap_or_default();
            output.error(&format!("Aborted{}: {} ({})", stage, error.message, error.kind));
        }
    }
}

/// Writes reports under the report directory
pub struct ReportWriter<'a> {
    fs: &'a dyn FileSystem,
    report_dir: &'a Path,
}

impl<'a> ReportWriter<'a> {
    pub fn new(fs: &'a dyn FileSystem, report_dir: &'a Path) -> Self {
        Self { fs, report_dir }
    }

    pub fn report_path(&self, environment: Environment, stamp: &RunStamp) -> PathBuf {
        self.report_dir
            .join(format!("import-report-{}.json", stamp.artifact_suffix(environment)))
    }

    pub fn write(&self, report: &RunReport, stamp: &RunStamp) -> Result<PathBuf> {
        let path = self.report_path(report.environment, stamp);
        let content = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
        self.fs
            .write(&path, &content)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::model::Outcome;
    use crate::traits::{MockFileSystem, MockOutput};

    fn result(address: &str, outcome: Outcome) -> OperationResult {
        OperationResult {
            address: address.to_string(),
            external_id: Some(format!("/ids/{}", address)),
            outcome,
            detail: String::new(),
        }
    }

    #[test]
    fn test_exit_code_fold() {
        let clean = Summary {
            successful: 2,
            failed: 0,
            skipped: 1,
        };
        let failed = Summary {
            successful: 1,
            failed: 1,
            skipped: 0,
        };
        let lock = RunError::StateLockHeld("held".to_string());

        assert_eq!(exit_code(&clean, None), 0);
        assert_eq!(exit_code(&failed, None), 1);
        assert_eq!(exit_code(&clean, Some(&lock)), 3);
    }

    #[test]
    fn test_build_report_with_failures() {
        let stamp = RunStamp::new();
        let report = RunReport::build(
            OperationKind::Bulk,
            Environment::Staging,
            &stamp,
            Some("network imports".to_string()),
            vec![
                result("azurerm_virtual_network.main", Outcome::Imported),
                result("azurerm_subnet.app", Outcome::FailedNotFound),
            ],
            None,
            Some(Verification::Clean),
            None,
        );

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.final_stage, Stage::Done);
        assert_eq!(report.exit_code, 1);
        assert_eq!(report.run_id, stamp.run_id);
        assert!(report.headline().contains("1 succeeded, 1 failed, 0 skipped"));
    }

    #[test]
    fn test_aborted_report_records_error() {
        let err = RunError::BackendUnavailable("connection refused".to_string());
        let report = RunReport::build(
            OperationKind::Individual,
            Environment::Production,
            &RunStamp::new(),
            None,
            Vec::new(),
            None,
            None,
            Some(&err),
        );

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.final_stage, Stage::Aborted);
        let error = report.error.as_ref().unwrap();
        assert_eq!(error.kind, "backend-unavailable");
        assert!(report.headline().contains("aborted"));
    }

    #[test]
    fn test_writer_uses_run_stamp_in_name() {
        let fs = MockFileSystem::new();
        let stamp = RunStamp::new();
        let report = RunReport::build(
            OperationKind::DryRun,
            Environment::Staging,
            &stamp,
            None,
            vec![result("azurerm_resource_group.main", Outcome::Ready)],
            None,
            None,
            None,
        );

        let path = ReportWriter::new(&fs, Path::new("/reports"))
            .write(&report, &stamp)
            .unwrap();

        assert_eq!(
            path,
            PathBuf::from(format!("/reports/import-report-{}.json", stamp.artifact_suffix(Environment::Staging)))
        );
        let written: serde_json::Value =
            serde_json::from_str(&fs.get_file_contents(&path).unwrap()).unwrap();
        assert_eq!(written["operation"], "import-dry-run");
        assert_eq!(written["status"], "success");
        assert_eq!(written["results"][0]["outcome"], "ready");
    }

    #[test]
    fn test_render_lists_results() {
        let output = MockOutput::new();
        let report = RunReport::build(
            OperationKind::Bulk,
            Environment::Staging,
            &RunStamp::new(),
            None,
            vec![result("azurerm_resource_group.main", Outcome::SkippedAlreadyBound)],
            None,
            Some(Verification::Divergence {
                summary: Some("Plan: 1 to add, 0 to change, 0 to destroy.".to_string()),
                plan_file: PathBuf::from("/reports/tfplan"),
            }),
            None,
        );

        report.render(&output);

        let text = output.to_text();
        assert!(text.contains("skipped-already-bound"));
        assert_eq!(output.get_warnings().len(), 1);
    }
}
