use super::{finish, Context, DeployArgs};
use clap::{Args, Subcommand};
use color_eyre::eyre::Result;
use overcloud_common::constants::{
    DEFAULT_INVENTORY_FILE, DEFAULT_SSH_NETWORK, DEFAULT_SSH_USER, DEFAULT_STACK_NAME,
};
use overcloud_upgrade::{PrepareOptions, RunOptions};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Args, Debug)]
pub struct FfwdUpgradeArgs {
    #[command(subcommand)]
    pub command: FfwdUpgradeCommand,
}

#[derive(Subcommand, Debug)]
pub enum FfwdUpgradeCommand {
    /// Refresh the plan and stack outputs for the fast forward upgrade
    Prepare(PrepareArgs),
    /// Run the fast forward upgrade playbook on the overcloud nodes
    Run(RunArgs),
    /// Converge the fast forward upgrade, unblocking future stack updates
    Converge(DeployArgs),
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// YAML file with container image parameters for the plan update
    #[arg(long)]
    pub container_registry_file: Option<PathBuf>,

    /// Network whose addresses are used to reach the overcloud nodes
    #[arg(long, default_value = DEFAULT_SSH_NETWORK)]
    pub overcloud_ssh_network: String,

    /// User for ssh access to the overcloud nodes
    #[arg(long, default_value = DEFAULT_SSH_USER)]
    pub overcloud_ssh_user: String,

    /// Private key for ssh access (default ~/.ssh/id_rsa)
    #[arg(long)]
    pub overcloud_ssh_key: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name or ID of the heat stack
    #[arg(long, env = "OVERCLOUD_STACK_NAME", default_value = DEFAULT_STACK_NAME)]
    pub stack: String,

    /// Skip the confirmation prompt. Use with caution!
    #[arg(long)]
    pub yes: bool,

    /// Existing ansible inventory to use instead of generating one
    #[arg(long)]
    pub static_inventory: Option<PathBuf>,

    /// DEPRECATED: only tripleo-admin should be used as ssh user
    #[arg(long, default_value = DEFAULT_SSH_USER)]
    pub ssh_user: String,

    /// Run ansible-playbook locally instead of through the workflow service
    #[arg(long)]
    pub no_workflow: bool,
}

pub async fn run(ctx: &Context, args: FfwdUpgradeArgs) -> Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let controller = ctx.phase_controller();

    match args.command {
        FfwdUpgradeCommand::Prepare(args) => {
            let options = PrepareOptions {
                deploy: args.deploy.to_options(&ctx.settings),
                container_registry_file: args.container_registry_file,
                ssh_network: args.overcloud_ssh_network,
                ssh_user: args.overcloud_ssh_user,
                ssh_key: args
                    .overcloud_ssh_key
                    .unwrap_or_else(|| home.join(".ssh").join("id_rsa")),
                rc_dir: std::env::current_dir()?,
            };
            finish("FFWD Upgrade Prepare", controller.prepare(&options).await?)
        }
        FfwdUpgradeCommand::Run(args) => {
            // Removed when dropped, after the run has finished
            let work_dir = run_work_dir()?;
            let options = RunOptions {
                stack: args.stack,
                yes: args.yes,
                static_inventory: args.static_inventory,
                inventory_path: home.join(DEFAULT_INVENTORY_FILE),
                ssh_user: args.ssh_user,
                no_workflow: args.no_workflow,
                verbosity: if ctx.verbose { 2 } else { 1 },
                work_dir: work_dir.path().to_path_buf(),
            };
            finish("FFWD Upgrade Run", controller.run(&options).await?)
        }
        FfwdUpgradeCommand::Converge(args) => finish(
            "FFWD Upgrade Converge",
            controller.converge(&args.to_options(&ctx.settings)).await?,
        ),
    }
}

/// A fresh private directory for the playbook bundle and ssh key of one run
fn run_work_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix("tripleo-")
        .suffix("-config")
        .tempdir()?)
}
