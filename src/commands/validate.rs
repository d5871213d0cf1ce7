use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::OrchestratorConfig;
use crate::context::Context;
use crate::import::batch::read_batch_file;
use crate::import::model::{Environment, RunStamp};
use crate::import::{EXIT_SUCCESS, EXIT_VALIDATION};

/// Check a batch file without touching any backend
#[derive(Debug, Args)]
pub struct ValidateConfigCommand {
    /// Batch file (YAML or JSON)
    file: PathBuf,

    /// Where to write the validation report (defaults to the report directory)
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    pub valid: bool,
    pub import_count: usize,
    pub errors: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl ValidateConfigCommand {
    pub fn execute(
        self,
        ctx: &Context,
        config: &OrchestratorConfig,
        environment: Option<Environment>,
    ) -> Result<i32> {
        ctx.output.section("Validate Batch File");
        ctx.output.key_value("File", &self.file.display().to_string());

        let report = Self::check(ctx, &self.file, environment);

        if report.valid {
            ctx.output.success(&format!(
                "{} import(s), no problems found",
                report.import_count
            ));
        } else {
            for error in &report.errors {
                ctx.output.error(error);
            }
            ctx.output
                .warning(&format!("{} problem(s) found", report.errors.len()));
        }

        let stamp = RunStamp::new();
        let path = self.report.unwrap_or_else(|| {
            config.report_dir.join(format!(
                "validation-report-{}-{}.json",
                stamp.file_stamp(),
                stamp.run_id
            ))
        });
        let content =
            serde_json::to_string_pretty(&report).context("Failed to serialize validation report")?;
        ctx.fs
            .write(&path, &content)
            .with_context(|| format!("Failed to write validation report to {}", path.display()))?;
        ctx.output.key_value("Report", &path.display().to_string());

        Ok(if report.valid {
            EXIT_SUCCESS
        } else {
            EXIT_VALIDATION
        })
    }

    fn check(ctx: &Context, file: &Path, environment: Option<Environment>) -> ValidationReport {
        let (import_count, errors) = match read_batch_file(ctx.fs.as_ref(), file) {
            Ok(raw) => {
                let errors = raw
                    .issues(file, environment)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                (raw.imports.len(), errors)
            }
            Err(e) => (0, vec![e.to_string()]),
        };

        ValidationReport {
            file: file.to_path_buf(),
            environment,
            valid: errors.is_empty(),
            import_count,
            errors,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{
        MockCommandExecutor, MockFileSystem, MockHttpClient, MockOutput, MockUserInput,
    };
    use std::sync::Arc;

    fn context(fs: Arc<MockFileSystem>, output: Arc<MockOutput>) -> Context {
        Context::test_with(
            fs,
            Arc::new(MockUserInput::new()),
            output,
            Arc::new(MockCommandExecutor::new()),
            Arc::new(MockHttpClient::new()),
        )
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            report_dir: PathBuf::from("/reports"),
            ..OrchestratorConfig::default()
        }
    }

    #[test]
    fn test_valid_file() {
        let fs = Arc::new(MockFileSystem::new().with_file(
            "/batch.yaml",
            "imports:\n  - resource_address: azurerm_resource_group.main\n    resource_id: /subscriptions/0000/resourceGroups/rg-main\n",
        ));
        let output = Arc::new(MockOutput::new());
        let ctx = context(fs.clone(), output.clone());
        let command = ValidateConfigCommand {
            file: PathBuf::from("/batch.yaml"),
            report: None,
        };

        let code = command.execute(&ctx, &config(), Some(Environment::Staging)).unwrap();

        assert_eq!(code, 0);
        let reports = fs.files_under(Path::new("/reports"));
        assert_eq!(reports.len(), 1);
        let json: serde_json::Value =
            serde_json::from_str(&fs.get_file_contents(&reports[0]).unwrap()).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["import_count"], 1);
    }

    #[test]
    fn test_all_problems_are_listed() {
        let fs = Arc::new(MockFileSystem::new().with_file(
            "/batch.json",
            r#"{"environment":"production","imports":[
                {"resource_address":"data.azurerm_client_config.current","resource_id":"x"},
                {"resource_address":"azurerm_resource_group.main"}
            ]}"#,
        ));
        let output = Arc::new(MockOutput::new());
        let ctx = context(fs.clone(), output.clone());
        let command = ValidateConfigCommand {
            file: PathBuf::from("/batch.json"),
            report: Some(PathBuf::from("/out/validation.json")),
        };

        let code = command.execute(&ctx, &config(), Some(Environment::Staging)).unwrap();

        assert_eq!(code, 2);
        // environment mismatch, invalid address, missing id
        assert_eq!(output.get_errors().len(), 3);
        let json: serde_json::Value = serde_json::from_str(
            &fs.get_file_contents(Path::new("/out/validation.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_file() {
        let fs = Arc::new(MockFileSystem::new());
        let output = Arc::new(MockOutput::new());
        let ctx = context(fs, output.clone());
        let command = ValidateConfigCommand {
            file: PathBuf::from("/nope.yaml"),
            report: None,
        };

        let code = command.execute(&ctx, &config(), None).unwrap();

        assert_eq!(code, 2);
        assert!(output.get_errors()[0].contains("not found"));
    }
}
