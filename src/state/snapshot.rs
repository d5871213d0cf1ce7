//! Pre-mutation state snapshots
//!
//! A snapshot is written once per mutating run, before the first state
//! change, and read back to confirm it landed. Retention is left to whatever
//! storage the snapshot directory lives on.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tracing::info;

use super::backend::StateBackend;
use crate::import::error::RunError;
use crate::import::model::{Environment, RunStamp};
use crate::traits::FileSystem;

/// Reference to a persisted snapshot, as recorded in the run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: String,
    pub environment: Environment,
    pub run_id: String,
    pub path: PathBuf,
    /// SHA-1 of the state document, hex encoded
    pub checksum: String,
    pub size_bytes: usize,
}

pub struct Snapshotter<'a> {
    backend: &'a dyn StateBackend,
    fs: &'a dyn FileSystem,
    snapshot_dir: &'a Path,
}

impl<'a> Snapshotter<'a> {
    pub fn new(backend: &'a dyn StateBackend, fs: &'a dyn FileSystem, snapshot_dir: &'a Path) -> Self {
        Self {
            backend,
            fs,
            snapshot_dir,
        }
    }

    /// Where the snapshot for this run goes
    pub fn snapshot_path(&self, environment: Environment, stamp: &RunStamp) -> PathBuf {
        self.snapshot_dir
            .join(environment.as_str())
            .join(format!("state-{}.tfstate", stamp.artifact_suffix(environment)))
    }

    /// Pull remote state and persist it
    ///
    /// Returns only once the file is confirmed on disk with the pulled content.
    pub fn capture(&self, environment: Environment, stamp: &RunStamp) -> Result<StateSnapshot, RunError> {
        let payload = self.backend.state_pull().map_err(RunError::from_backend)?;
        let path = self.snapshot_path(environment, stamp);

        if self.fs.exists(&path) {
            return Err(RunError::SnapshotFailed(format!(
                "{} already exists",
                path.display()
            )));
        }

        self.fs
            .write(&path, &payload)
            .map_err(|e| RunError::SnapshotFailed(format!("{:#}", e)))?;

        let written = self
            .fs
            .read_to_string(&path)
            .map_err(|e| RunError::SnapshotFailed(format!("{:#}", e)))?;
        if written != payload {
            return Err(RunError::SnapshotFailed(format!(
                "{} does not match the pulled state",
                path.display()
            )));
        }

        let checksum = format!("{:x}", Sha1::digest(payload.as_bytes()));
        info!("State snapshot written to {} (sha1 {})", path.display(), checksum);

        Ok(StateSnapshot {
            timestamp: stamp.started_at.to_rfc3339(),
            environment,
            run_id: stamp.run_id.clone(),
            path,
            checksum,
            size_bytes: payload.len(),
        })
    }
}
