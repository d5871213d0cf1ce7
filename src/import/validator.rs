//! Input validation
//!
//! Turns a raw operation request into a [`ValidatedRun`]. Nothing here
//! touches the backend; the only side effect is reading the batch file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::batch::load_batch;
use super::error::ValidationError;
use super::model::{Environment, ImportBatch, ImportSpec, is_valid_resource_address};
use crate::traits::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "import-individual")]
    Individual,
    #[serde(rename = "import-bulk")]
    Bulk,
    #[serde(rename = "import-dry-run")]
    DryRun,
    #[serde(rename = "state-remove")]
    Remove,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Individual => "import-individual",
            OperationKind::Bulk => "import-bulk",
            OperationKind::DryRun => "import-dry-run",
            OperationKind::Remove => "state-remove",
        }
    }

    /// Whether the operation changes managed state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, OperationKind::DryRun)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated parameters as they arrive from the command line
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Individual {
        address: Option<String>,
        external_id: Option<String>,
    },
    Bulk {
        config_file: Option<PathBuf>,
    },
    DryRun {
        config_file: Option<PathBuf>,
        address: Option<String>,
        external_id: Option<String>,
    },
    Remove {
        address: Option<String>,
    },
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Individual { .. } => OperationKind::Individual,
            OperationRequest::Bulk { .. } => OperationKind::Bulk,
            OperationRequest::DryRun { .. } => OperationKind::DryRun,
            OperationRequest::Remove { .. } => OperationKind::Remove,
        }
    }
}

/// What a validated run will act on
#[derive(Debug, Clone, PartialEq)]
pub enum Work {
    Imports(ImportBatch),
    Removal { address: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRun {
    pub kind: OperationKind,
    pub environment: Environment,
    pub working_dir: PathBuf,
    pub work: Work,
}

impl ValidatedRun {
    pub fn description(&self) -> Option<&str> {
        match &self.work {
            Work::Imports(batch) => batch.description.as_deref(),
            Work::Removal { .. } => None,
        }
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingParameter(name))
}

fn checked_address(value: &Option<String>) -> Result<String, ValidationError> {
    let address = required(value, "resource address")?;
    if !is_valid_resource_address(address) {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }
    Ok(address.to_string())
}

fn single_spec_batch(
    environment: Environment,
    address: &Option<String>,
    external_id: &Option<String>,
) -> Result<ImportBatch, ValidationError> {
    let resource_address = checked_address(address)?;
    let external_id = required(external_id, "external id")?.to_string();

    Ok(ImportBatch {
        description: None,
        environment,
        imports: vec![ImportSpec {
            resource_address,
            external_id,
            description: None,
        }],
    })
}

fn batch_from_file(
    fs: &dyn FileSystem,
    config_file: &Option<PathBuf>,
    environment: Environment,
) -> Result<ImportBatch, ValidationError> {
    let path = config_file
        .as_deref()
        .ok_or(ValidationError::MissingParameter("config file"))?;
    load_batch(fs, path, environment)
}

/// Validate `request` for `environment`, failing on the first problem
pub fn validate(
    fs: &dyn FileSystem,
    request: &OperationRequest,
    environment: Environment,
    working_dir: &Path,
) -> Result<ValidatedRun, ValidationError> {
    let work = match request {
        OperationRequest::Individual {
            address,
            external_id,
        } => Work::Imports(single_spec_batch(environment, address, external_id)?),
        OperationRequest::Bulk { config_file } => {
            Work::Imports(batch_from_file(fs, config_file, environment)?)
        }
        OperationRequest::DryRun {
            config_file,
            address,
            external_id,
        } => {
            let has_pair = address.is_some() || external_id.is_some();
            match (config_file.is_some(), has_pair) {
                (true, true) => {
                    return Err(ValidationError::ConflictingParameters(
                        "give either a config file or an address/id pair, not both".to_string(),
                    ));
                }
                (true, false) => Work::Imports(batch_from_file(fs, config_file, environment)?),
                (false, true) => {
                    Work::Imports(single_spec_batch(environment, address, external_id)?)
                }
                (false, false) => {
                    return Err(ValidationError::MissingParameter(
                        "config file or resource address and external id",
                    ));
                }
            }
        }
        OperationRequest::Remove { address } => Work::Removal {
            address: checked_address(address)?,
        },
    };

    if !fs.is_dir(working_dir) {
        return Err(ValidationError::MissingWorkingDir(working_dir.to_path_buf()));
    }

    Ok(ValidatedRun {
        kind: request.kind(),
        environment,
        working_dir: working_dir.to_path_buf(),
        work,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    const WORKDIR: &str = "/repo/terraform/environments/staging";

    fn fs() -> MockFileSystem {
        MockFileSystem::new().with_dir(WORKDIR)
    }

    fn individual(address: Option<&str>, id: Option<&str>) -> OperationRequest {
        OperationRequest::Individual {
            address: address.map(str::to_string),
            external_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_individual_valid() {
        let run = validate(
            &fs(),
            &individual(
                Some("azurerm_resource_group.main"),
                Some("/subscriptions/1/resourceGroups/rg"),
            ),
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap();

        assert_eq!(run.kind, OperationKind::Individual);
        let Work::Imports(batch) = run.work else {
            panic!("expected imports");
        };
        assert_eq!(batch.imports.len(), 1);
        assert_eq!(
            batch.imports[0].external_id,
            "/subscriptions/1/resourceGroups/rg"
        );
    }

    #[test]
    fn test_individual_missing_external_id() {
        let err = validate(
            &fs(),
            &individual(Some("azurerm_resource_group.main"), None),
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert_eq!(err, ValidationError::MissingParameter("external id"));
    }

    #[test]
    fn test_individual_blank_address() {
        let err = validate(
            &fs(),
            &individual(Some("   "), Some("id")),
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert_eq!(err, ValidationError::MissingParameter("resource address"));
    }

    #[test]
    fn test_individual_malformed_address() {
        let err = validate(
            &fs(),
            &individual(Some("resource group main"), Some("id")),
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::InvalidAddress(_)));
    }

    #[test]
    fn test_bulk_requires_config_file() {
        let err = validate(
            &fs(),
            &OperationRequest::Bulk { config_file: None },
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert_eq!(err, ValidationError::MissingParameter("config file"));
    }

    #[test]
    fn test_dry_run_rejects_both_sources() {
        let err = validate(
            &fs(),
            &OperationRequest::DryRun {
                config_file: Some(PathBuf::from("/batch.json")),
                address: Some("azurerm_resource_group.main".to_string()),
                external_id: Some("id".to_string()),
            },
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::ConflictingParameters(_)));
    }

    #[test]
    fn test_dry_run_requires_a_source() {
        let err = validate(
            &fs(),
            &OperationRequest::DryRun {
                config_file: None,
                address: None,
                external_id: None,
            },
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::MissingParameter(_)));
    }

    #[test]
    fn test_remove_validates_address() {
        let run = validate(
            &fs(),
            &OperationRequest::Remove {
                address: Some("azurerm_resource_group.old".to_string()),
            },
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap();

        assert_eq!(
            run.work,
            Work::Removal {
                address: "azurerm_resource_group.old".to_string()
            }
        );
        assert!(run.kind.is_mutating());
    }

    #[test]
    fn test_missing_working_dir() {
        let err = validate(
            &MockFileSystem::new(),
            &individual(Some("azurerm_resource_group.main"), Some("id")),
            Environment::Staging,
            Path::new(WORKDIR),
        )
        .unwrap_err();

        assert_eq!(err, ValidationError::MissingWorkingDir(PathBuf::from(WORKDIR)));
    }
}
