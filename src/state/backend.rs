use std::path::Path;
use thiserror::Error;

/// Failure of a provisioning backend call, classified from its output
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// Backend (binary, remote state storage or provider API) cannot be reached
    #[error("{0}")]
    Unavailable(String),

    /// Another process holds the state lock
    #[error("{0}")]
    LockHeld(String),

    /// The external object does not exist or cannot be accessed
    #[error("{0}")]
    NotFound(String),

    /// The address is already bound to an object in state
    #[error("{0}")]
    AlreadyManaged(String),

    #[error("'{command}' failed (exit code {}): {message}", .exit_code.map_or("none".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        message: String,
    },
}

/// Result of a `plan -detailed-exitcode` run
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    NoChanges,
    /// `summary` is the "Plan: X to add, ..." line when the backend printed one
    Changes { summary: Option<String> },
}

/// Operations the orchestrator needs from the provisioning backend
///
/// Every call runs against the managed state of a single environment.
pub trait StateBackend: Send + Sync {
    /// Name of the backend binary, for messages
    fn name(&self) -> &str;

    /// Initialize the working directory (`init -input=false`)
    fn init(&self) -> Result<(), BackendError>;

    /// Installed backend version, e.g. `1.6.2`
    fn version(&self) -> Result<String, BackendError>;

    /// Raw remote state document (`state pull`)
    fn state_pull(&self) -> Result<String, BackendError>;

    /// Addresses in state, optionally filtered to those matching `address`
    fn state_list(&self, address: Option<&str>) -> Result<Vec<String>, BackendError>;

    /// Human-readable attributes of a bound address, `None` when not bound
    fn state_show(&self, address: &str) -> Result<Option<String>, BackendError>;

    /// Bind `external_id` to `address`
    fn import(&self, address: &str, external_id: &str) -> Result<(), BackendError>;

    /// Remove `address` from state without destroying the object
    fn state_rm(&self, address: &str) -> Result<(), BackendError>;

    fn refresh(&self) -> Result<(), BackendError>;

    fn validate(&self) -> Result<(), BackendError>;

    /// Plan against current configuration, saving the plan to `out`
    fn plan(&self, out: &Path) -> Result<PlanOutcome, BackendError>;
}

const LOCK_MARKERS: &[&str] = &["error acquiring the state lock", "state blob is already locked"];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "failed to get existing workspaces",
    "error loading state",
    "failed to load state",
    "backend initialization required",
    "connection refused",
    "no such host",
    "i/o timeout",
    "tls handshake timeout",
    "failed to get access token",
    "please run \"az login\"",
];

const ALREADY_MANAGED_MARKERS: &[&str] = &["resource already managed"];

/// The address has no resource block, which is not about the remote object
const MISSING_CONFIGURATION_MARKERS: &[&str] = &[
    "does not exist in the configuration",
    "configuration for import target does not exist",
    "please create its configuration",
];

const NOT_FOUND_MARKERS: &[&str] = &[
    "cannot import non-existent remote object",
    "resourcenotfound",
    "resourcegroupnotfound",
    "could not be found",
    "was not found",
    "does not exist",
    "statuscode=404",
    "authorizationfailed",
    "statuscode=403",
];

/// Classify a failed backend invocation from its combined output
pub fn classify_failure(command: &str, exit_code: Option<i32>, output: &str) -> BackendError {
    let lowered = output.to_lowercase();
    let message = first_error_line(output);
    let matches_any = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    if matches_any(LOCK_MARKERS) {
        BackendError::LockHeld(message)
    } else if matches_any(UNAVAILABLE_MARKERS) {
        BackendError::Unavailable(message)
    } else if matches_any(ALREADY_MANAGED_MARKERS) {
        BackendError::AlreadyManaged(message)
    } else if matches_any(MISSING_CONFIGURATION_MARKERS) {
        BackendError::CommandFailed {
            command: command.to_string(),
            exit_code,
            message,
        }
    } else if matches_any(NOT_FOUND_MARKERS) {
        BackendError::NotFound(message)
    } else {
        BackendError::CommandFailed {
            command: command.to_string(),
            exit_code,
            message,
        }
    }
}

/// The most useful single line of backend output: the first `Error:` line,
/// else the first non-empty line
fn first_error_line(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '│' | '╷' | '╵')))
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .iter()
        .find(|line| line.starts_with("Error:"))
        .or_else(|| lines.first())
        .map(|line| line.to_string())
        .unwrap_or_else(|| "no output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lock_held() {
        let stderr = "╷\n│ Error: Error acquiring the state lock\n│\n│ Lock Info:\n│   ID: 1234\n╵\n";
        let err = classify_failure("terraform import", Some(1), stderr);

        assert_eq!(
            err,
            BackendError::LockHeld("Error: Error acquiring the state lock".to_string())
        );
    }

    #[test]
    fn test_classify_non_existent_object() {
        let stderr = "Error: Cannot import non-existent remote object\n\nWhile attempting to import...";
        let err = classify_failure("terraform import", Some(1), stderr);

        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[test]
    fn test_classify_azure_not_found() {
        let stderr = "Error: retrieving Resource Group \"rg-missing\": resources.GroupsClient#Get: Failure responding to request: StatusCode=404 -- Original Error: Code=\"ResourceGroupNotFound\"";
        assert!(matches!(
            classify_failure("terraform import", Some(1), stderr),
            BackendError::NotFound(_)
        ));
    }

    #[test]
    fn test_classify_missing_configuration() {
        let stderr = "╷\n│ Error: resource address \"azurerm_resource_group.app\" does not exist in the configuration.\n│\n│ Before importing this resource, please create its configuration in the root module.\n╵\n";
        let err = classify_failure("terraform import", Some(1), stderr);

        assert_eq!(
            err,
            BackendError::CommandFailed {
                command: "terraform import".to_string(),
                exit_code: Some(1),
                message: "Error: resource address \"azurerm_resource_group.app\" does not exist in the configuration.".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_already_managed() {
        let stderr = "Error: Resource already managed by Terraform";
        assert!(matches!(
            classify_failure("terraform import", Some(1), stderr),
            BackendError::AlreadyManaged(_)
        ));
    }

    #[test]
    fn test_classify_unavailable() {
        let stderr = "Error: Failed to get existing workspaces: containers.Client#ListBlobs: dial tcp: connection refused";
        assert!(matches!(
            classify_failure("terraform state pull", Some(1), stderr),
            BackendError::Unavailable(_)
        ));
    }

    #[test]
    fn test_classify_other_failure_keeps_command() {
        let err = classify_failure("terraform import", Some(1), "Error: Invalid provider configuration");

        assert_eq!(
            err.to_string(),
            "'terraform import' failed (exit code 1): Error: Invalid provider configuration"
        );
    }

    #[test]
    fn test_first_error_line_falls_back_to_first_line() {
        assert_eq!(first_error_line("\n  something odd\nmore"), "something odd");
        assert_eq!(first_error_line(""), "no output");
    }
}
