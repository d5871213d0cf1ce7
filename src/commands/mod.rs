pub mod import;
pub mod state;
pub mod validate;

pub use import::{ImportBulkCommand, ImportDryRunCommand, ImportIndividualCommand};
pub use state::StateRemoveCommand;
pub use validate::ValidateConfigCommand;

use crate::cloud::AzureCliProbe;
use crate::config::OrchestratorConfig;
use crate::context::Context;
use crate::import::model::Environment;
use crate::import::validator::OperationRequest;
use crate::orchestrator::Orchestrator;
use crate::state::TofuBackend;

/// Run one state operation against `environment` and return its exit code
pub(crate) fn run_operation(
    ctx: &Context,
    config: &OrchestratorConfig,
    environment: Environment,
    request: &OperationRequest,
    assume_yes: bool,
) -> i32 {
    let working_dir = config.working_dir_for(environment);
    let backend = TofuBackend::new(&config.backend_binary, &working_dir, ctx.command.clone());
    let probe = AzureCliProbe::new(&config.cloud_cli, working_dir.clone(), ctx.command.clone());

    Orchestrator::new(ctx, config, &backend, &probe)
        .assume_yes(assume_yes)
        .run(request, environment)
        .exit_code
}
