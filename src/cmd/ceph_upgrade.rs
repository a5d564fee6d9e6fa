use super::{finish, Context, DeployArgs};
use clap::{Args, Subcommand};
use color_eyre::eyre::Result;
use overcloud_upgrade::CephUpgradeOptions;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CephUpgradeArgs {
    #[command(subcommand)]
    pub command: CephUpgradeCommand,
}

#[derive(Subcommand, Debug)]
pub enum CephUpgradeCommand {
    /// Run the ceph rolling upgrade and converge the stack
    Run(CephRunArgs),
}

#[derive(Args, Debug)]
pub struct CephRunArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// YAML file with container image parameters for the plan update
    #[arg(long)]
    pub container_registry_file: Option<PathBuf>,
}

pub async fn run(ctx: &Context, args: CephUpgradeArgs) -> Result<()> {
    match args.command {
        CephUpgradeCommand::Run(args) => {
            let options = CephUpgradeOptions {
                deploy: args.deploy.to_options(&ctx.settings),
                container_registry_file: args.container_registry_file,
            };
            let outcome = ctx.phase_controller().ceph_upgrade(&options).await?;
            finish("Ceph Upgrade", outcome)
        }
    }
}
