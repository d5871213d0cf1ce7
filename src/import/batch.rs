//! Batch file parsing
//!
//! The on-disk document is deserialized into loosely-typed `RawBatchFile`
//! and only becomes an [`ImportBatch`] once every entry passed validation.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use super::error::ValidationError;
use super::model::{Environment, ImportBatch, ImportSpec, is_valid_resource_address};
use crate::traits::FileSystem;

#[derive(Debug, Deserialize)]
pub struct RawBatchFile {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub imports: Vec<RawImport>,
}

#[derive(Debug, Deserialize)]
pub struct RawImport {
    #[serde(default)]
    pub resource_address: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn parse_environment(value: &str) -> Option<Environment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "staging" => Some(Environment::Staging),
        "production" => Some(Environment::Production),
        _ => None,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Read and deserialize a batch file (JSON for `.json`, YAML otherwise)
pub fn read_batch_file(fs: &dyn FileSystem, path: &Path) -> Result<RawBatchFile, ValidationError> {
    if !fs.is_file(path) {
        return Err(ValidationError::FileNotFound(path.to_path_buf()));
    }

    let content = fs
        .read_to_string(path)
        .map_err(|e| ValidationError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let parsed = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ValidationError::Malformed {
        path: path.to_path_buf(),
        message,
    })
}

impl RawBatchFile {
    /// Every problem with this document, in file order
    ///
    /// `selected` is the environment chosen for the run, if any.
    pub fn issues(&self, path: &Path, selected: Option<Environment>) -> Vec<ValidationError> {
        let mut issues = Vec::new();

        if let Some(raw_env) = non_blank(&self.environment) {
            match (parse_environment(raw_env), selected) {
                (None, _) => issues.push(ValidationError::Malformed {
                    path: path.to_path_buf(),
                    message: format!("unknown environment '{}'", raw_env),
                }),
                (Some(batch_env), Some(selected)) if batch_env != selected => {
                    issues.push(ValidationError::EnvironmentMismatch {
                        batch: batch_env.to_string(),
                        selected: selected.to_string(),
                    })
                }
                _ => {}
            }
        }

        if self.imports.is_empty() {
            issues.push(ValidationError::EmptyBatch(path.to_path_buf()));
            return issues;
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.imports.iter().enumerate() {
            let index = index + 1;

            match non_blank(&entry.resource_address) {
                None => issues.push(ValidationError::InvalidEntry {
                    index,
                    message: "missing resource_address".to_string(),
                }),
                Some(address) if !is_valid_resource_address(address) => {
                    issues.push(ValidationError::InvalidEntry {
                        index,
                        message: format!("invalid resource address '{}'", address),
                    })
                }
                Some(address) => {
                    if !seen.insert(address) {
                        issues.push(ValidationError::DuplicateAddress(address.to_string()));
                    }
                }
            }

            if non_blank(&entry.resource_id).is_none() {
                issues.push(ValidationError::InvalidEntry {
                    index,
                    message: "missing resource_id".to_string(),
                });
            }
        }

        issues
    }

    /// Convert into a validated batch, failing on the first issue
    pub fn into_batch(
        self,
        path: &Path,
        selected: Environment,
    ) -> Result<ImportBatch, ValidationError> {
        if let Some(issue) = self.issues(path, Some(selected)).into_iter().next() {
            return Err(issue);
        }

        let imports = self
            .imports
            .iter()
            .map(|entry| ImportSpec {
                resource_address: non_blank(&entry.resource_address)
                    .unwrap_or_default()
                    .to_string(),
                external_id: non_blank(&entry.resource_id).unwrap_or_default().to_string(),
                description: non_blank(&entry.description).map(str::to_string),
            })
            .collect();

        Ok(ImportBatch {
            description: non_blank(&self.description).map(str::to_string),
            environment: selected,
            imports,
        })
    }
}

/// Read, parse and validate a batch file for `selected`
pub fn load_batch(
    fs: &dyn FileSystem,
    path: &Path,
    selected: Environment,
) -> Result<ImportBatch, ValidationError> {
    read_batch_file(fs, path)?.into_batch(path, selected)
}
