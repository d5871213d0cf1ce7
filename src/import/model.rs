use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

lazy_static! {
    /// `[module.<name>[<key>].]*<type>.<name>[<key>]`, keys are integers or quoted strings
    static ref RESOURCE_ADDRESS: Regex = Regex::new(
        r#"^(?:module\.[A-Za-z_][A-Za-z0-9_-]*(?:\[(?:[0-9]+|"[^"]*")\])?\.)*(?P<type>[A-Za-z_][A-Za-z0-9_-]*)\.[A-Za-z_][A-Za-z0-9_-]*(?:\[(?:[0-9]+|"[^"]*")\])?$"#
    )
    .expect("resource address pattern is valid");
}

/// Check that `address` is a bindable managed resource address
///
/// Data sources and bare module addresses cannot be import targets.
pub fn is_valid_resource_address(address: &str) -> bool {
    RESOURCE_ADDRESS
        .captures(address)
        .and_then(|caps| caps.name("type"))
        .is_some_and(|resource_type| !matches!(resource_type.as_str(), "module" | "data"))
}

/// Identity of one run: a random id plus the start time
///
/// Every artifact a run writes (snapshot, plan, report) carries both, so
/// names stay unique even for runs started within the same second.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStamp {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl RunStamp {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            started_at: Utc::now(),
        }
    }

    /// `YYYYMMDD-HHMMSS` in UTC, for file names
    pub fn file_stamp(&self) -> String {
        self.started_at.format("%Y%m%d-%H%M%S").to_string()
    }

    /// `<environment>-<YYYYMMDD-HHMMSS>-<run id>`
    pub fn artifact_suffix(&self, environment: Environment) -> String {
        format!("{}-{}-{}", environment, self.file_stamp(), self.run_id)
    }
}

impl Default for RunStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Target environment of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One binding request: put the external object `external_id` under `resource_address`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSpec {
    pub resource_address: String,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A validated, ordered list of imports for one environment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportBatch {
    pub description: Option<String>,
    pub environment: Environment,
    pub imports: Vec<ImportSpec>,
}

/// Outcome of a single state operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Imported,
    Removed,
    /// Dry-run: address unbound and external object reachable
    Ready,
    SkippedAlreadyBound,
    SkippedNotBound,
    FailedNotFound,
    FailedOther,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::FailedNotFound | Outcome::FailedOther)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::SkippedAlreadyBound | Outcome::SkippedNotBound)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Imported => "imported",
            Outcome::Removed => "removed",
            Outcome::Ready => "ready",
            Outcome::SkippedAlreadyBound => "skipped-already-bound",
            Outcome::SkippedNotBound => "skipped-not-bound",
            Outcome::FailedNotFound => "failed-not-found",
            Outcome::FailedOther => "failed-other",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result recorded for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_id: Option<String>,
    pub outcome: Outcome,
    pub detail: String,
}

impl OperationResult {
    pub fn new(spec: &ImportSpec, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            address: spec.resource_address.clone(),
            external_id: Some(spec.external_id.clone()),
            outcome,
            detail: detail.into(),
        }
    }
}

/// Aggregate counts over a run's results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results(results: &[OperationResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            if result.outcome.is_failure() {
                summary.failed += 1;
            } else if result.outcome.is_skip() {
                summary.skipped += 1;
            } else {
                summary.successful += 1;
            }
            summary
        })
    }

    #[cfg(test)]
    pub fn attempted(&self) -> usize {
        self.successful + self.failed + self.skipped
    }
}
