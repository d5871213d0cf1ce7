use clap::Args;
use std::path::PathBuf;

use super::run_operation;
use crate::config::OrchestratorConfig;
use crate::context::Context;
use crate::import::model::Environment;
use crate::import::validator::OperationRequest;

/// Import a single existing object into state
#[derive(Debug, Args)]
pub struct ImportIndividualCommand {
    /// Resource address to bind, e.g. azurerm_resource_group.main
    #[arg(short, long)]
    address: Option<String>,

    /// Provider-side id of the existing object
    #[arg(long)]
    id: Option<String>,
}

impl ImportIndividualCommand {
    fn request(self) -> OperationRequest {
        OperationRequest::Individual {
            address: self.address,
            external_id: self.id,
        }
    }

    pub fn execute(self, ctx: &Context, config: &OrchestratorConfig, environment: Environment) -> i32 {
        ctx.output.section("Import");
        run_operation(ctx, config, environment, &self.request(), false)
    }
}

/// Import every entry of a batch file
#[derive(Debug, Args)]
pub struct ImportBulkCommand {
    /// Batch file (YAML or JSON)
    #[arg(short = 'f', long)]
    config_file: Option<PathBuf>,
}

impl ImportBulkCommand {
    fn request(self) -> OperationRequest {
        OperationRequest::Bulk {
            config_file: self.config_file,
        }
    }

    pub fn execute(self, ctx: &Context, config: &OrchestratorConfig, environment: Environment) -> i32 {
        ctx.output.section("Bulk Import");
        run_operation(ctx, config, environment, &self.request(), false)
    }
}

/// Check which imports would succeed without changing state
#[derive(Debug, Args)]
pub struct ImportDryRunCommand {
    /// Batch file (YAML or JSON)
    #[arg(short = 'f', long, conflicts_with_all = ["address", "id"])]
    config_file: Option<PathBuf>,

    /// Resource address to check
    #[arg(short, long)]
    address: Option<String>,

    /// Provider-side id to check
    #[arg(long)]
    id: Option<String>,
}

impl ImportDryRunCommand {
    fn request(self) -> OperationRequest {
        OperationRequest::DryRun {
            config_file: self.config_file,
            address: self.address,
            external_id: self.id,
        }
    }

    pub fn execute(self, ctx: &Context, config: &OrchestratorConfig, environment: Environment) -> i32 {
        ctx.output.section("Import Dry Run");
        run_operation(ctx, config, environment, &self.request(), false)
    }
}
