use clap::Args;

use super::run_operation;
use crate::config::OrchestratorConfig;
use crate::context::Context;
use crate::import::model::Environment;
use crate::import::validator::OperationRequest;

/// Remove an address from state, leaving the cloud object in place
#[derive(Debug, Args)]
pub struct StateRemoveCommand {
    /// Resource address to remove
    #[arg(short, long)]
    address: Option<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

impl StateRemoveCommand {
    pub fn execute(self, ctx: &Context, config: &OrchestratorConfig, environment: Environment) -> i32 {
        ctx.output.section("State Remove");
        let request = OperationRequest::Remove {
            address: self.address,
        };
        run_operation(ctx, config, environment, &request, self.yes)
    }
}
