//! Import executor
//!
//! Runs the per-address operations of a batch in order. Per-item failures
//! are recorded and the batch continues; a held lock or an unreachable
//! backend stops the batch and is handed back as the fatal error of the run.

use super::error::RunError;
use super::model::{ImportSpec, OperationResult, Outcome, Summary};
use crate::cloud::{Existence, ProbeError, ResourceProbe};
use crate::state::backend::{BackendError, StateBackend};
use crate::traits::Output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Apply,
    DryRun,
}

/// Ordered results of a batch plus the error that stopped it, if any
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionOutcome {
    pub results: Vec<OperationResult>,
    pub fatal: Option<RunError>,
}

#[cfg(test)]
impl ExecutionOutcome {
    pub fn summary(&self) -> Summary {
        Summary::from_results(&self.results)
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.results.iter().map(|r| r.outcome).collect()
    }
}

fn is_fatal(err: &BackendError) -> bool {
    matches!(err, BackendError::LockHeld(_) | BackendError::Unavailable(_))
}

pub struct ImportExecutor<'a> {
    backend: &'a dyn StateBackend,
    probe: &'a dyn ResourceProbe,
    output: &'a dyn Output,
}

impl<'a> ImportExecutor<'a> {
    pub fn new(
        backend: &'a dyn StateBackend,
        probe: &'a dyn ResourceProbe,
        output: &'a dyn Output,
    ) -> Self {
        Self {
            backend,
            probe,
            output,
        }
    }

    /// Process every spec in order
    pub fn execute(&self, specs: &[ImportSpec], mode: ExecutionMode) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();
        let total = specs.len();

        for (index, spec) in specs.iter().enumerate() {
            self.output.dimmed(&format!(
                "[{}/{}] {} ← {}",
                index + 1,
                total,
                spec.resource_address,
                spec.external_id
            ));

            match self.process(spec, mode) {
                Ok(result) => {
                    self.show_result(&result);
                    outcome.results.push(result);
                }
                Err(fatal) => {
                    self.output.error(&format!(
                        "Stopping at {}: {}",
                        spec.resource_address, fatal
                    ));
                    outcome.fatal = Some(fatal);
                    break;
                }
            }
        }

        outcome
    }

    fn process(&self, spec: &ImportSpec, mode: ExecutionMode) -> Result<OperationResult, RunError> {
        let address = spec.resource_address.as_str();

        match self.backend.state_list(Some(address)) {
            Ok(bound) if bound.iter().any(|a| a == address) => {
                return Ok(OperationResult::new(
                    spec,
                    Outcome::SkippedAlreadyBound,
                    "already present in state",
                ));
            }
            Ok(_) => {}
            Err(e) if is_fatal(&e) => return Err(RunError::from_backend(e)),
            Err(e) => {
                return Ok(OperationResult::new(
                    spec,
                    Outcome::FailedOther,
                    format!("state query failed: {}", e),
                ));
            }
        }

        match mode {
            ExecutionMode::DryRun => self.check_readiness(spec),
            ExecutionMode::Apply => self.bind(spec),
        }
    }

    fn check_readiness(&self, spec: &ImportSpec) -> Result<OperationResult, RunError> {
        let result = match self.probe.exists(&spec.external_id) {
            Ok(Existence::Exists) => OperationResult::new(
                spec,
                Outcome::Ready,
                "external object found; ready to import",
            ),
            Ok(Existence::NotFound) => {
                OperationResult::new(spec, Outcome::FailedNotFound, "external object not found")
            }
            Ok(Existence::Forbidden) => OperationResult::new(
                spec,
                Outcome::FailedNotFound,
                "external object not accessible with current credentials",
            ),
            Err(ProbeError::Unavailable(message)) => {
                return Err(RunError::BackendUnavailable(message));
            }
            Err(err @ ProbeError::Unexpected(_)) => {
                OperationResult::new(spec, Outcome::FailedOther, err.to_string())
            }
        };
        Ok(result)
    }

    fn bind(&self, spec: &ImportSpec) -> Result<OperationResult, RunError> {
        let result = match self.backend.import(&spec.resource_address, &spec.external_id) {
            Ok(()) => OperationResult::new(spec, Outcome::Imported, "imported into state"),
            Err(BackendError::NotFound(message)) => {
                OperationResult::new(spec, Outcome::FailedNotFound, message)
            }
            Err(BackendError::AlreadyManaged(message)) => {
                OperationResult::new(spec, Outcome::SkippedAlreadyBound, message)
            }
            Err(e) if is_fatal(&e) => return Err(RunError::from_backend(e)),
            Err(e) => OperationResult::new(spec, Outcome::FailedOther, e.to_string()),
        };
        Ok(result)
    }

    /// Remove one address from state; an unbound address is skipped
    pub fn remove(&self, address: &str) -> ExecutionOutcome {
        let result = |outcome: Outcome, detail: String| OperationResult {
            address: address.to_string(),
            external_id: None,
            outcome,
            detail,
        };

        let mut outcome = ExecutionOutcome::default();
        let step = match self.backend.state_show(address) {
            Ok(None) => Ok(result(Outcome::SkippedNotBound, "not present in state".to_string())),
            Ok(Some(_)) => match self.backend.state_rm(address) {
                Ok(()) => Ok(result(Outcome::Removed, "removed from state".to_string())),
                Err(e) if is_fatal(&e) => Err(RunError::from_backend(e)),
                Err(e) => Ok(result(Outcome::FailedOther, e.to_string())),
            },
            Err(e) if is_fatal(&e) => Err(RunError::from_backend(e)),
            Err(e) => Ok(result(
                Outcome::FailedOther,
                format!("state query failed: {}", e),
            )),
        };

        match step {
            Ok(r) => {
                self.show_result(&r);
                outcome.results.push(r);
            }
            Err(fatal) => {
                self.output.error(&format!("Stopping at {}: {}", address, fatal));
                outcome.fatal = Some(fatal);
            }
        }
        outcome
    }

    fn show_result(&self, result: &OperationResult) {
        let line = format!("{} → {} ({})", result.address, result.outcome, result.detail);
        if result.outcome.is_failure() {
            self.output.error(&line);
        } else if result.outcome.is_skip() {
            self.output.info(&line);
        } else {
            self.output.success(&line);
        }
    }
}
