pub mod ceph_upgrade;
pub mod console;
pub mod ffwd_upgrade;
pub mod node;
pub mod undercloud;

use clap::Args;
use color_eyre::eyre::Result;
use overcloud_common::constants::DEFAULT_STACK_NAME;
use overcloud_common::Settings;
use overcloud_upgrade::{
    CommandDeployer, DeployPhaseOptions, PhaseController, PhaseOutcome, SystemRunner,
};
use overcloud_workflow::{
    ConfigDownloader, HeatStackStore, MistralClient, Orchestrator, ZaqarBus,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Wiring shared by every command
pub struct Context {
    pub settings: Settings,
    pub verbose: bool,
}

impl Context {
    pub fn orchestrator(&self) -> Orchestrator {
        let client = MistralClient::new(&self.settings.workflow_url)
            .with_auth_token(self.settings.auth_token.clone());
        let bus = ZaqarBus::new(&self.settings.messaging_url)
            .with_credentials(self.settings.auth_token.clone(), self.settings.project_id.clone());
        Orchestrator::new(Arc::new(client), Arc::new(bus))
            .with_reporter(Arc::new(console::ConsoleReporter))
            .with_wait_timeout(self.settings.wait_timeout())
    }

    pub fn phase_controller(&self) -> PhaseController {
        let stacks = HeatStackStore::new(&self.settings.orchestration_url)
            .with_auth_token(self.settings.auth_token.clone());
        let bundles = ConfigDownloader::new(&self.settings.object_store_url)
            .with_auth_token(self.settings.auth_token.clone());
        let runner = Arc::new(SystemRunner);
        PhaseController::new(
            self.orchestrator(),
            Arc::new(stacks),
            Arc::new(CommandDeployer::new(runner.clone())),
        )
        .with_runner(runner)
        .with_bundles(Arc::new(bundles))
    }
}

/// Arguments for phases that delegate to a full overcloud deploy
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Name or ID of the heat stack
    #[arg(long, env = "OVERCLOUD_STACK_NAME", default_value = DEFAULT_STACK_NAME)]
    pub stack: String,

    /// Heat templates directory (default from config)
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Environment files, applied in order
    #[arg(short = 'e', long = "environment-file")]
    pub environment_files: Vec<PathBuf>,

    /// Skip the confirmation prompt. Use with caution!
    #[arg(long)]
    pub yes: bool,
}

impl DeployArgs {
    pub fn to_options(&self, settings: &Settings) -> DeployPhaseOptions {
        DeployPhaseOptions {
            stack: self.stack.clone(),
            templates: Some(
                self.templates
                    .clone()
                    .unwrap_or_else(|| settings.templates_dir.clone()),
            ),
            environment_files: self.environment_files.clone(),
            extra_args: Vec::new(),
            yes: self.yes,
        }
    }
}

/// Print the outcome of a phase
pub fn finish(phase: &str, outcome: PhaseOutcome) -> Result<()> {
    match outcome {
        PhaseOutcome::Completed => println!("{} complete.", phase),
        PhaseOutcome::Aborted => println!("{} cancelled, nothing was changed.", phase),
    }
    Ok(())
}
