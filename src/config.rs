//! Run configuration
//!
//! Loaded once per run from an optional YAML/JSON file, overridden by CLI
//! flags and environment variables, then passed by reference everywhere.
//! Nothing mutates it after [`OrchestratorConfig::resolve`] returns.

use anyhow::{Context, Result};
use semver::VersionReq;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::import::model::Environment;
use crate::traits::FileSystem;

/// Config file picked up from the current directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "tfimport.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Provisioning backend executable (`terraform` or `tofu`)
    pub backend_binary: String,
    /// Optional semver requirement the backend version must satisfy, e.g. `~1.6`
    pub backend_version: Option<String>,
    /// Cloud CLI used for resource existence checks
    pub cloud_cli: String,
    /// Parent of the per-environment working directories
    pub environments_root: PathBuf,
    /// Explicit working directory; wins over `environments_root/<env>`
    pub working_dir: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
    pub report_dir: PathBuf,
    pub webhook_url: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backend_binary: "terraform".to_string(),
            backend_version: None,
            cloud_cli: "az".to_string(),
            environments_root: PathBuf::from("terraform/environments"),
            working_dir: None,
            snapshot_dir: PathBuf::from(".state-backups"),
            report_dir: PathBuf::from("reports"),
            webhook_url: None,
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backend_binary: Option<String>,
    pub cloud_cli: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub webhook_url: Option<String>,
}

impl OrchestratorConfig {
    /// Load the config file (if any) and apply overrides
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn resolve(
        fs: &dyn FileSystem,
        path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(fs, path)?,
            None if fs.is_file(Path::new(DEFAULT_CONFIG_FILE)) => {
                Self::from_file(fs, Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        let config = base.with_overrides(overrides);
        config.backend_version_req()?;
        Ok(config)
    }

    /// Parse a config file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let content = fs
            .read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(binary) = &overrides.backend_binary {
            self.backend_binary = binary.clone();
        }
        if let Some(cli) = &overrides.cloud_cli {
            self.cloud_cli = cli.clone();
        }
        if let Some(dir) = &overrides.working_dir {
            self.working_dir = Some(dir.clone());
        }
        if let Some(dir) = &overrides.snapshot_dir {
            self.snapshot_dir = dir.clone();
        }
        if let Some(dir) = &overrides.report_dir {
            self.report_dir = dir.clone();
        }
        if let Some(url) = &overrides.webhook_url {
            self.webhook_url = Some(url.clone());
        }
        self
    }

    /// Resolve relative directories against `base`
    ///
    /// Backend commands run inside the working directory, so any path handed
    /// to them (the saved plan in particular) must not depend on the cwd.
    pub fn anchored(mut self, base: &Path) -> Self {
        self.environments_root = base.join(&self.environments_root);
        self.working_dir = self.working_dir.map(|dir| base.join(dir));
        self.snapshot_dir = base.join(&self.snapshot_dir);
        self.report_dir = base.join(&self.report_dir);
        self
    }

    /// Directory the backend commands run in for `environment`
    pub fn working_dir_for(&self, environment: Environment) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.clone(),
            None => self.environments_root.join(environment.as_str()),
        }
    }

    pub fn backend_version_req(&self) -> Result<Option<VersionReq>> {
        self.backend_version
            .as_deref()
            .map(|req| {
                VersionReq::parse(req)
                    .with_context(|| format!("Invalid backend_version requirement: {}", req))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    #[test]
    fn test_defaults_without_config_file() {
        let fs = MockFileSystem::new();
        let config = OrchestratorConfig::resolve(&fs, None, &ConfigOverrides::default()).unwrap();

        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(
            config.working_dir_for(Environment::Staging),
            PathBuf::from("terraform/environments/staging")
        );
    }

    #[test]
    fn test_yaml_file_then_overrides() {
        let fs = MockFileSystem::new().with_file(
            "/etc/tfimport.yaml",
            "backend_binary: tofu\nbackend_version: \"~1.6\"\nreport_dir: /var/reports\nwebhook_url: https://hooks.example.net/a\n",
        );
        let overrides = ConfigOverrides {
            report_dir: Some(PathBuf::from("/tmp/reports")),
            ..Default::default()
        };

        let config =
            OrchestratorConfig::resolve(&fs, Some(Path::new("/etc/tfimport.yaml")), &overrides)
                .unwrap();

        assert_eq!(config.backend_binary, "tofu");
        assert_eq!(config.report_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.net/a")
        );
        assert!(config.backend_version_req().unwrap().is_some());
        // Unset fields keep their defaults
        assert_eq!(config.cloud_cli, "az");
    }

    #[test]
    fn test_json_config_file() {
        let fs = MockFileSystem::new().with_file(
            "/cfg/tfimport.json",
            r#"{"environments_root": "infra/envs", "cloud_cli": "az"}"#,
        );

        let config = OrchestratorConfig::from_file(&fs, Path::new("/cfg/tfimport.json")).unwrap();

        assert_eq!(
            config.working_dir_for(Environment::Production),
            PathBuf::from("infra/envs/production")
        );
    }

    #[test]
    fn test_explicit_working_dir_wins() {
        let config = OrchestratorConfig::default().with_overrides(&ConfigOverrides {
            working_dir: Some(PathBuf::from("/work")),
            ..Default::default()
        });

        assert_eq!(
            config.working_dir_for(Environment::Production),
            PathBuf::from("/work")
        );
    }

    #[test]
    fn test_anchored_makes_directories_absolute() {
        let config = OrchestratorConfig::default()
            .with_overrides(&ConfigOverrides {
                snapshot_dir: Some(PathBuf::from("/var/backups")),
                ..Default::default()
            })
            .anchored(Path::new("/home/ops/infra"));

        assert_eq!(config.report_dir, PathBuf::from("/home/ops/infra/reports"));
        assert_eq!(config.snapshot_dir, PathBuf::from("/var/backups"));
        assert_eq!(
            config.working_dir_for(Environment::Staging),
            PathBuf::from("/home/ops/infra/terraform/environments/staging")
        );
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let fs = MockFileSystem::new();
        let result = OrchestratorConfig::resolve(
            &fs,
            Some(Path::new("/missing.yaml")),
            &ConfigOverrides::default(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_version_requirement_rejected() {
        let fs = MockFileSystem::new().with_file("/c.yaml", "backend_version: not-a-version\n");
        let result =
            OrchestratorConfig::resolve(&fs, Some(Path::new("/c.yaml")), &ConfigOverrides::default());

        assert!(result.is_err());
    }
}
