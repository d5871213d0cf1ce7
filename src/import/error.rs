use std::path::PathBuf;
use thiserror::Error;

use crate::state::backend::BackendError;

/// Bad or missing input, detected before any side effect
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid resource address '{0}'")]
    InvalidAddress(String),

    #[error("Conflicting parameters: {0}")]
    ConflictingParameters(String),

    #[error("Batch file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to parse batch file {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Batch file {} contains no imports", .0.display())]
    EmptyBatch(PathBuf),

    #[error("Import #{index}: {message}")]
    InvalidEntry { index: usize, message: String },

    #[error("Duplicate resource address '{0}' in batch")]
    DuplicateAddress(String),

    #[error("Batch targets environment '{batch}' but '{selected}' was selected")]
    EnvironmentMismatch { batch: String, selected: String },

    #[error("Working directory does not exist: {}", .0.display())]
    MissingWorkingDir(PathBuf),
}

/// Errors that abort a run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("State lock is held; release it manually before retrying: {0}")]
    StateLockHeld(String),

    #[error("Backend version {found} does not satisfy required {required}")]
    BackendVersionMismatch { found: String, required: String },

    #[error("State snapshot could not be persisted: {0}")]
    SnapshotFailed(String),

    #[error("Post-import verification failed: {0}")]
    VerificationError(String),
}

impl RunError {
    /// Map a backend failure outside the per-item loop to a fatal run error
    pub fn from_backend(err: BackendError) -> Self {
        match err {
            BackendError::LockHeld(message) => RunError::StateLockHeld(message),
            other => RunError::BackendUnavailable(other.to_string()),
        }
    }

    /// Short machine-readable name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Validation(_) => "validation-error",
            RunError::BackendUnavailable(_) => "backend-unavailable",
            RunError::StateLockHeld(_) => "state-lock-held",
            RunError::BackendVersionMismatch { .. } => "backend-version-mismatch",
            RunError::SnapshotFailed(_) => "snapshot-failed",
            RunError::VerificationError(_) => "verification-error",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Validation(_) => super::EXIT_VALIDATION,
            _ => super::EXIT_ABORTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_held_maps_to_state_lock_error() {
        let err = RunError::from_backend(BackendError::LockHeld("lock id 1234".to_string()));
        assert_eq!(err.kind(), "state-lock-held");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_other_backend_errors_map_to_unavailable() {
        let err = RunError::from_backend(BackendError::Unavailable("connection refused".to_string()));
        assert!(matches!(err, RunError::BackendUnavailable(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn test_validation_exit_code() {
        let err = RunError::from(ValidationError::MissingParameter("external id"));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "Validation failed: Missing required parameter: external id");
    }
}
