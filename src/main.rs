mod cloud;
mod commands;
mod config;
mod context;
mod import;
mod logging;
mod orchestrator;
mod output;
mod report;
mod state;
#[cfg(test)]
mod test_helpers;
mod traits;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    ImportBulkCommand, ImportDryRunCommand, ImportIndividualCommand, StateRemoveCommand,
    ValidateConfigCommand,
};
use config::{ConfigOverrides, OrchestratorConfig};
use context::Context;
use import::model::Environment;
use import::{EXIT_ABORTED, EXIT_VALIDATION};

#[derive(Parser)]
#[command(name = "tfimport")]
#[command(about = "Import existing cloud resources into Terraform/OpenTofu state, safely", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Target environment
    #[arg(short, long, global = true, value_enum)]
    environment: Option<Environment>,

    /// Configuration file (defaults to tfimport.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend working directory (defaults to <environments_root>/<environment>)
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    /// Directory for state snapshots
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Directory for run reports and saved plans
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    /// Webhook notified at the end of each run
    #[arg(long, global = true, env = "TFIMPORT_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Backend binary, e.g. terraform or tofu
    #[arg(long, global = true, env = "TFIMPORT_BACKEND")]
    backend_binary: Option<String>,

    /// Cloud CLI used for existence checks during dry-runs
    #[arg(long, global = true, env = "TFIMPORT_CLOUD_CLI")]
    cloud_cli: Option<String>,

    /// Increase diagnostic output (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend_binary: self.backend_binary.clone(),
            cloud_cli: self.cloud_cli.clone(),
            working_dir: self.working_dir.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
            report_dir: self.report_dir.clone(),
            webhook_url: self.webhook_url.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import one existing object by address and id
    ImportIndividual(ImportIndividualCommand),

    /// Import every entry of a batch file
    ImportBulk(ImportBulkCommand),

    /// Report which imports would succeed, without changing state
    ImportDryRun(ImportDryRunCommand),

    /// Remove an address from state without destroying the object
    StateRemove(StateRemoveCommand),

    /// Check a batch file for problems
    ValidateConfig(ValidateConfigCommand),
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.global.verbose);

    let ctx = Context::new();
    let code = match run(cli, &ctx) {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            EXIT_ABORTED
        }
    };

    std::process::exit(code);
}

fn run(cli: Cli, ctx: &Context) -> Result<i32> {
    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    let config = match OrchestratorConfig::resolve(
        ctx.fs.as_ref(),
        cli.global.config.as_deref(),
        &cli.global.overrides(),
    ) {
        Ok(config) => config.anchored(&cwd),
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            return Ok(EXIT_VALIDATION);
        }
    };

    let environment = cli.global.environment;
    let code = match cli.command {
        Commands::ImportIndividual(command) => {
            with_environment(ctx, environment, |env| command.execute(ctx, &config, env))
        }
        Commands::ImportBulk(command) => {
            with_environment(ctx, environment, |env| command.execute(ctx, &config, env))
        }
        Commands::ImportDryRun(command) => {
            with_environment(ctx, environment, |env| command.execute(ctx, &config, env))
        }
        Commands::StateRemove(command) => {
            with_environment(ctx, environment, |env| command.execute(ctx, &config, env))
        }
        Commands::ValidateConfig(command) => command.execute(ctx, &config, environment)?,
    };

    Ok(code)
}

/// Operations that touch state need an explicit environment
fn with_environment(
    ctx: &Context,
    environment: Option<Environment>,
    operation: impl FnOnce(Environment) -> i32,
) -> i32 {
    match environment {
        Some(environment) => operation(environment),
        None => {
            ctx.output
                .error("Missing required parameter: --environment (staging or production)");
            EXIT_VALIDATION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tfimport",
            "import-bulk",
            "--config-file",
            "batch.yaml",
            "--environment",
            "production",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.global.environment, Some(Environment::Production));
        assert_eq!(cli.global.verbose, 2);
        assert!(matches!(cli.command, Commands::ImportBulk(_)));
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = Cli::try_parse_from([
            "tfimport",
            "--backend-binary",
            "tofu",
            "--report-dir",
            "/tmp/reports",
            "validate-config",
            "batch.yaml",
        ])
        .unwrap();

        let overrides = cli.global.overrides();
        assert_eq!(overrides.backend_binary.as_deref(), Some("tofu"));
        assert_eq!(overrides.report_dir, Some(PathBuf::from("/tmp/reports")));
    }
}
