//! Import batches: parsing, validation and execution

pub mod batch;
pub mod error;
pub mod executor;
pub mod model;
pub mod validator;

pub use error::RunError;

/// Every operation succeeded or was skipped
pub const EXIT_SUCCESS: i32 = 0;
/// The run completed but at least one operation failed
pub const EXIT_FAILED: i32 = 1;
/// Input was rejected before any side effect
pub const EXIT_VALIDATION: i32 = 2;
/// The run was aborted by a fatal error
pub const EXIT_ABORTED: i32 = 3;
