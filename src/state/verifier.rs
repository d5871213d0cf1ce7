//! Post-change verification
//!
//! Runs refresh, validate and a saved plan against the environment. A plan
//! with pending changes is divergence, reported as a warning; any command
//! failure is a verification error and aborts the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::backend::{PlanOutcome, StateBackend};
use crate::import::error::RunError;
use crate::import::model::{Environment, RunStamp};
use crate::traits::FileSystem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum Verification {
    Clean,
    Divergence {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        summary: Option<String>,
        plan_file: PathBuf,
    },
}

fn failed(step: &str, err: impl fmt::Display) -> RunError {
    RunError::VerificationError(format!("{} failed: {}", step, err))
}

pub struct Verifier<'a> {
    backend: &'a dyn StateBackend,
    fs: &'a dyn FileSystem,
    plan_dir: &'a Path,
}

impl<'a> Verifier<'a> {
    pub fn new(backend: &'a dyn StateBackend, fs: &'a dyn FileSystem, plan_dir: &'a Path) -> Self {
        Self {
            backend,
            fs,
            plan_dir,
        }
    }

    pub fn plan_path(&self, environment: Environment, stamp: &RunStamp) -> PathBuf {
        self.plan_dir
            .join(format!("tfplan-{}", stamp.artifact_suffix(environment)))
    }

    pub fn verify(&self, environment: Environment, stamp: &RunStamp) -> Result<Verification, RunError> {
        self.backend.refresh().map_err(|e| failed("refresh", e))?;
        self.backend.validate().map_err(|e| failed("validate", e))?;

        self.fs
            .create_dir_all(self.plan_dir)
            .map_err(|e| failed("preparing plan directory", format!("{:#}", e)))?;

        let plan_file = self.plan_path(environment, stamp);
        match self.backend.plan(&plan_file).map_err(|e| failed("plan", e))? {
            PlanOutcome::NoChanges => {
                info!("Verification clean for {}", environment);
                Ok(Verification::Clean)
            }
            PlanOutcome::Changes { summary } => {
                warn!(
                    "Plan for {} still has changes: {}",
                    environment,
                    summary.as_deref().unwrap_or("no summary")
                );
                Ok(Verification::Divergence { summary, plan_file })
            }
        }
    }
}
