use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Existence, ProbeError, ResourceProbe};
use crate::traits::CommandExecutor;

/// Existence check backed by `az resource show --ids <id>`
pub struct AzureCliProbe {
    cli: String,
    working_dir: PathBuf,
    command: Arc<dyn CommandExecutor>,
}

impl AzureCliProbe {
    pub fn new(cli: &str, working_dir: PathBuf, command: Arc<dyn CommandExecutor>) -> Self {
        Self {
            cli: cli.to_string(),
            working_dir,
            command,
        }
    }
}

const NOT_FOUND_CODES: &[&str] = &[
    "resourcenotfound",
    "resourcegroupnotfound",
    "parentresourcenotfound",
    "could not be found",
];

const FORBIDDEN_CODES: &[&str] = &["authorizationfailed", "forbidden", "does not have authorization"];

const UNAVAILABLE_HINTS: &[&str] = &[
    "please run 'az login'",
    "az login",
    "connection aborted",
    "max retries exceeded",
];

impl ResourceProbe for AzureCliProbe {
    fn exists(&self, external_id: &str) -> Result<Existence, ProbeError> {
        let args = ["resource", "show", "--ids", external_id, "--output", "none"];
        debug!("Checking existence of {} with {}", external_id, self.cli);

        let output = self
            .command
            .execute(&self.cli, &args, &self.working_dir)
            .map_err(|e| ProbeError::Unavailable(format!("{:#}", e)))?;

        if output.status.success() {
            return Ok(Existence::Exists);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lowered = stderr.to_lowercase();
        let contains_any = |hints: &[&str]| hints.iter().any(|h| lowered.contains(h));

        if contains_any(NOT_FOUND_CODES) {
            Ok(Existence::NotFound)
        } else if contains_any(FORBIDDEN_CODES) {
            Ok(Existence::Forbidden)
        } else if contains_any(UNAVAILABLE_HINTS) {
            Err(ProbeError::Unavailable(stderr.trim().to_string()))
        } else {
            Err(ProbeError::Unexpected(stderr.trim().to_string()))
        }
    }
}
