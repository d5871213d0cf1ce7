//! Run orchestration
//!
//! Drives one operation through its stages:
//! `Validating → Snapshotting → Executing → Verifying → Reporting → Done`.
//! Dry-runs skip snapshotting and verification. A fatal error at any stage
//! moves the run to `Aborted`; the report is written and the notification
//! sent either way, except that a run rejected during validation is not
//! announced.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(test)]
use std::path::PathBuf;
use tracing::{debug, info};

use crate::cloud::ResourceProbe;
use crate::config::OrchestratorConfig;
use crate::context::Context;
use crate::import::executor::{ExecutionMode, ImportExecutor};
use crate::import::model::{Environment, OperationResult, RunStamp};
use crate::import::validator::{self, OperationRequest, ValidatedRun, Work};
use crate::import::{EXIT_ABORTED, EXIT_SUCCESS, RunError};
use crate::report::{Delivery, Notifier, ReportWriter, RunReport};
use crate::state::{StateBackend, StateSnapshot, Snapshotter, Verification, Verifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validating,
    Snapshotting,
    Executing,
    Verifying,
    Reporting,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Snapshotting => "snapshotting",
            Stage::Executing => "executing",
            Stage::Verifying => "verifying",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What a finished run left behind
///
/// The report itself is already rendered and written by the time this is
/// returned; tests keep hold of it to inspect the run.
#[derive(Debug)]
pub struct RunOutcome {
    /// `None` when the run was cancelled before it started
    #[cfg(test)]
    pub report: Option<RunReport>,
    #[cfg(test)]
    pub report_path: Option<PathBuf>,
    pub exit_code: i32,
}

/// Everything gathered while the stages run
#[derive(Default)]
struct Progress {
    stage: Option<Stage>,
    results: Vec<OperationResult>,
    snapshot: Option<StateSnapshot>,
    verification: Option<Verification>,
    fatal: Option<RunError>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        debug!("Entering stage {}", stage);
        self.stage = Some(stage);
    }
}

pub struct Orchestrator<'a> {
    ctx: &'a Context,
    config: &'a OrchestratorConfig,
    backend: &'a dyn StateBackend,
    probe: &'a dyn ResourceProbe,
    assume_yes: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        ctx: &'a Context,
        config: &'a OrchestratorConfig,
        backend: &'a dyn StateBackend,
        probe: &'a dyn ResourceProbe,
    ) -> Self {
        Self {
            ctx,
            config,
            backend,
            probe,
            assume_yes: false,
        }
    }

    /// Skip the confirmation prompt of destructive operations
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    pub fn run(&self, request: &OperationRequest, environment: Environment) -> RunOutcome {
        let stamp = RunStamp::new();
        let kind = request.kind();
        let working_dir = self.config.working_dir_for(environment);

        self.ctx.output.environment_badge(environment.as_str());
        info!(
            "Starting {} on {} (run {}, working dir {})",
            kind,
            environment,
            stamp.run_id,
            working_dir.display()
        );

        let validated = match validator::validate(
            self.ctx.fs.as_ref(),
            request,
            environment,
            &working_dir,
        ) {
            Ok(validated) => validated,
            Err(err) => {
                let progress = Progress {
                    stage: Some(Stage::Validating),
                    fatal: Some(RunError::from(err)),
                    ..Progress::default()
                };
                let report = self.build_report(kind, environment, &stamp, None, progress);
                return self.finish(report, &stamp, false);
            }
        };

        if !self.confirmed(&validated) {
            self.ctx.output.info("Cancelled; nothing was changed");
            return RunOutcome {
                #[cfg(test)]
                report: None,
                #[cfg(test)]
                report_path: None,
                exit_code: EXIT_SUCCESS,
            };
        }

        let mut progress = Progress::default();
        if let Err(err) = self.run_stages(&validated, &stamp, &mut progress) {
            progress.fatal = Some(err);
        }

        let description = validated.description().map(str::to_string);
        let report = self.build_report(kind, environment, &stamp, description, progress);
        self.finish(report, &stamp, true)
    }

    fn confirmed(&self, run: &ValidatedRun) -> bool {
        let Work::Removal { address } = &run.work else {
            return true;
        };
        if self.assume_yes {
            return true;
        }

        let prompt = format!(
            "Remove {} from {} state? The cloud object is left untouched.",
            address, run.environment
        );
        match self.ctx.input.confirm(&prompt, false) {
            Ok(answer) => answer,
            Err(e) => {
                self.ctx
                    .output
                    .warning(&format!("Could not read confirmation: {:#}", e));
                false
            }
        }
    }

    fn run_stages(
        &self,
        run: &ValidatedRun,
        stamp: &RunStamp,
        progress: &mut Progress,
    ) -> Result<(), RunError> {
        let mutating = run.kind.is_mutating();

        if mutating {
            progress.enter(Stage::Snapshotting);
            self.preflight()?;
            self.ctx.output.subsection("Snapshotting state");
            let snapshot = Snapshotter::new(
                self.backend,
                self.ctx.fs.as_ref(),
                &self.config.snapshot_dir,
            )
            .capture(run.environment, stamp)?;
            self.ctx
                .output
                .success(&format!("State saved to {}", snapshot.path.display()));
            progress.snapshot = Some(snapshot);
            progress.enter(Stage::Executing);
        } else {
            progress.enter(Stage::Executing);
            self.preflight()?;
        }

        self.ctx.output.subsection(match run.work {
            Work::Imports(_) if mutating => "Importing",
            Work::Imports(_) => "Checking import readiness",
            Work::Removal { .. } => "Removing from state",
        });

        let executor = ImportExecutor::new(self.backend, self.probe, self.ctx.output.as_ref());
        let outcome = match &run.work {
            Work::Imports(batch) => {
                let mode = if mutating {
                    ExecutionMode::Apply
                } else {
                    ExecutionMode::DryRun
                };
                executor.execute(&batch.imports, mode)
            }
            Work::Removal { address } => executor.remove(address),
        };
        progress.results = outcome.results;
        if let Some(fatal) = outcome.fatal {
            return Err(fatal);
        }

        if mutating {
            progress.enter(Stage::Verifying);
            self.ctx.output.subsection("Verifying");
            let verification = Verifier::new(
                self.backend,
                self.ctx.fs.as_ref(),
                &self.config.report_dir,
            )
            .verify(run.environment, stamp)?;
            progress.verification = Some(verification);
        }

        Ok(())
    }

    /// Initialize the working directory and check the pinned backend version
    ///
    /// Dry-runs call this too. `init` only prepares the working directory
    /// (providers, modules, backend config); it never writes state.
    fn preflight(&self) -> Result<(), RunError> {
        self.backend.init().map_err(RunError::from_backend)?;

        let Some(required) = self.config.backend_version.as_deref() else {
            return Ok(());
        };
        let found = self.backend.version().map_err(RunError::from_backend)?;
        let mismatch = || RunError::BackendVersionMismatch {
            found: found.clone(),
            required: required.to_string(),
        };

        let req = VersionReq::parse(required).map_err(|_| mismatch())?;
        let version = Version::parse(&found).map_err(|_| mismatch())?;
        if !req.matches(&version) {
            return Err(mismatch());
        }

        debug!("{} {} satisfies {}", self.backend.name(), found, required);
        Ok(())
    }

    fn build_report(
        &self,
        kind: validator::OperationKind,
        environment: Environment,
        stamp: &RunStamp,
        description: Option<String>,
        progress: Progress,
    ) -> RunReport {
        let mut report = RunReport::build(
            kind,
            environment,
            stamp,
            description,
            progress.results,
            progress.snapshot,
            progress.verification,
            progress.fatal.as_ref(),
        );
        if progress.fatal.is_some() {
            report.aborted_at = progress.stage;
        }
        report
    }

    fn finish(&self, report: RunReport, stamp: &RunStamp, announce: bool) -> RunOutcome {
        debug!("Entering stage {}", Stage::Reporting);
        let output = self.ctx.output.as_ref();
        report.render(output);

        let report_path = match ReportWriter::new(self.ctx.fs.as_ref(), &self.config.report_dir)
            .write(&report, stamp)
        {
            Ok(path) => {
                output.key_value("Report", &path.display().to_string());
                Some(path)
            }
            Err(e) => {
                output.error(&format!("{:#}", e));
                None
            }
        };

        if announce {
            let notifier = Notifier::new(self.ctx.http.as_ref(), self.config.webhook_url.as_deref());
            match notifier.notify(&report, report_path.as_deref()) {
                Ok(Delivery::Sent(status)) => {
                    output.dimmed(&format!("Notification sent (HTTP {})", status))
                }
                Ok(Delivery::Skipped) => {}
                Err(e) => output.warning(&format!("{:#}", e)),
            }
        }

        let exit_code = match (&report_path, report.exit_code) {
            (None, EXIT_SUCCESS) => EXIT_ABORTED,
            (_, code) => code,
        };
        info!(
            "Run {} finished: {} (exit code {})",
            report.run_id, report.status.as_str(), exit_code
        );

        RunOutcome {
            #[cfg(test)]
            report: Some(report),
            #[cfg(test)]
            report_path,
            exit_code,
        }
    }
}
