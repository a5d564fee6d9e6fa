use clap::{Args, Subcommand};
use color_eyre::eyre::Result;
use overcloud_upgrade::{deploy_undercloud, SystemRunner, UndercloudOptions};

#[derive(Args, Debug)]
pub struct UndercloudArgs {
    #[command(subcommand)]
    pub command: UndercloudCommand,
}

#[derive(Subcommand, Debug)]
pub enum UndercloudCommand {
    /// Install and set up the undercloud
    Install(UndercloudFlags),
    /// Upgrade the undercloud
    Upgrade(UndercloudFlags),
}

#[derive(Args, Debug)]
pub struct UndercloudFlags {
    /// Force stack_action=UPDATE on the ephemeral heat stack
    #[arg(long)]
    pub force_stack_update: bool,

    /// Do not perform undercloud configuration validations
    #[arg(long)]
    pub no_validations: bool,

    /// Activate in-flight validations during the deploy
    #[arg(long = "inflight-validations")]
    pub inflight: bool,

    /// Print the install command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Skip yes/no prompt (assume yes)
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn run(args: UndercloudArgs, verbose: bool) -> Result<()> {
    let (upgrade, flags) = match args.command {
        UndercloudCommand::Install(flags) => (false, flags),
        UndercloudCommand::Upgrade(flags) => (true, flags),
    };

    let options = UndercloudOptions {
        upgrade,
        dry_run: flags.dry_run,
        yes: flags.yes,
        no_validations: flags.no_validations,
        inflight_validations: flags.inflight,
        force_stack_update: flags.force_stack_update,
        verbosity: if verbose { 2 } else { 1 },
    };

    let command = deploy_undercloud(&SystemRunner, &options).await?;
    if options.dry_run {
        println!("{}", command.display());
    }
    Ok(())
}
