//! Managed state: backend access, snapshots and post-change verification

pub mod backend;
pub mod snapshot;
pub mod tofu;
pub mod verifier;

pub use backend::StateBackend;
pub use snapshot::{Snapshotter, StateSnapshot};
pub use tofu::TofuBackend;
pub use verifier::{Verification, Verifier};
