use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use tracing::debug;

use super::backend::{BackendError, PlanOutcome, StateBackend, classify_failure};
use crate::traits::CommandExecutor;

lazy_static! {
    static ref PLAN_SUMMARY: Regex =
        Regex::new(r"(?m)^\s*Plan: .*$").expect("plan summary pattern is valid");
    static ref VERSION_LINE: Regex = Regex::new(r"(?:Terraform|OpenTofu) v(\d+\.\d+\.\d+\S*)")
        .expect("version pattern is valid");
}

/// Terraform / OpenTofu CLI backend for one environment's working directory
pub struct TofuBackend {
    binary: String,
    working_dir: PathBuf,
    command: Arc<dyn CommandExecutor>,
}

impl TofuBackend {
    pub fn new(binary: &str, working_dir: &Path, command: Arc<dyn CommandExecutor>) -> Self {
        Self {
            binary: binary.to_string(),
            working_dir: working_dir.to_path_buf(),
            command,
        }
    }

    fn label(&self, args: &[&str]) -> String {
        let words: Vec<&str> = args
            .iter()
            .take_while(|arg| !arg.starts_with('-'))
            .take(2)
            .copied()
            .collect();
        format!("{} {}", self.binary, words.join(" "))
    }

    fn run(&self, args: &[&str]) -> Result<Output, BackendError> {
        debug!(
            "Running {} {} in {}",
            self.binary,
            args.join(" "),
            self.working_dir.display()
        );

        let output = self
            .command
            .execute(&self.binary, args, &self.working_dir)
            .map_err(|e| BackendError::Unavailable(format!("{}: {:#}", self.label(args), e)))?;

        debug!("{} exited with {:?}", self.label(args), output.status.code());
        Ok(output)
    }

    fn run_checked(&self, args: &[&str]) -> Result<String, BackendError> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(self.failure(args, &output))
    }

    fn failure(&self, args: &[&str], output: &Output) -> BackendError {
        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
        classify_failure(&self.label(args), output.status.code(), &combined)
    }
}

fn parse_version(stdout: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(stdout)
        && let Some(version) = json.get("terraform_version").and_then(|v| v.as_str())
    {
        return Some(version.to_string());
    }

    VERSION_LINE
        .captures(stdout)
        .map(|caps| caps[1].to_string())
}

impl StateBackend for TofuBackend {
    fn name(&self) -> &str {
        &self.binary
    }

    fn init(&self) -> Result<(), BackendError> {
        self.run_checked(&["init", "-input=false", "-no-color"])
            .map(|_| ())
            // Any init failure means the backend is not usable for this run
            .map_err(|e| match e {
                BackendError::LockHeld(_) | BackendError::Unavailable(_) => e,
                other => BackendError::Unavailable(other.to_string()),
            })
    }

    fn version(&self) -> Result<String, BackendError> {
        let stdout = self.run_checked(&["version", "-json"])?;
        parse_version(&stdout).ok_or_else(|| {
            BackendError::Unavailable(format!(
                "Could not determine {} version from: {}",
                self.binary,
                stdout.trim()
            ))
        })
    }

    fn state_pull(&self) -> Result<String, BackendError> {
        self.run_checked(&["state", "pull"])
    }

    fn state_list(&self, address: Option<&str>) -> Result<Vec<String>, BackendError> {
        let mut args = vec!["state", "list"];
        if let Some(address) = address {
            args.push(address);
        }

        let output = self.run(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
            // A local backend without any state yet has nothing bound
            if stderr.contains("no state file was found") {
                return Ok(Vec::new());
            }
            return Err(self.failure(&args, &output));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn state_show(&self, address: &str) -> Result<Option<String>, BackendError> {
        let args = ["state", "show", "-no-color", address];
        let output = self.run(&args)?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("no instance found for the given address") {
            return Ok(None);
        }

        Err(self.failure(&args, &output))
    }

    fn import(&self, address: &str, external_id: &str) -> Result<(), BackendError> {
        self.run_checked(&["import", "-input=false", "-no-color", address, external_id])
            .map(|_| ())
    }

    fn state_rm(&self, address: &str) -> Result<(), BackendError> {
        self.run_checked(&["state", "rm", address]).map(|_| ())
    }

    fn refresh(&self) -> Result<(), BackendError> {
        self.run_checked(&["refresh", "-input=false", "-no-color"])
            .map(|_| ())
    }

    fn validate(&self) -> Result<(), BackendError> {
        self.run_checked(&["validate", "-no-color"]).map(|_| ())
    }

    fn plan(&self, out: &Path) -> Result<PlanOutcome, BackendError> {
        let out_arg = format!("-out={}", out.display());
        let args = [
            "plan",
            "-input=false",
            "-no-color",
            "-detailed-exitcode",
            out_arg.as_str(),
        ];
        let output = self.run(&args)?;

        // -detailed-exitcode: 0 = no changes, 1 = error, 2 = changes present
        match output.status.code() {
            Some(0) => Ok(PlanOutcome::NoChanges),
            Some(2) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let summary = PLAN_SUMMARY
                    .find(&stdout)
                    .map(|m| m.as_str().trim().to_string());
                Ok(PlanOutcome::Changes { summary })
            }
            _ => Err(self.failure(&args, &output)),
        }
    }
}
