//! Cloud-side existence checks for external objects

pub mod azure;

pub use azure::AzureCliProbe;

use thiserror::Error;

/// What the cloud API says about an external id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    NotFound,
    /// The object may exist but the caller cannot read it
    Forbidden,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProbeError {
    /// The cloud CLI could not be run or the API could not be reached
    #[error("Cloud API unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected response from cloud CLI: {0}")]
    Unexpected(String),
}

/// Query-by-id capability of the cloud provider
pub trait ResourceProbe: Send + Sync {
    fn exists(&self, external_id: &str) -> Result<Existence, ProbeError>;
}
