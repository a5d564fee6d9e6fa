// Operator CLI for overcloud baremetal and upgrade workflows
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::stderr;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;

use cmd::ceph_upgrade::CephUpgradeArgs;
use cmd::ffwd_upgrade::FfwdUpgradeArgs;
use cmd::node::NodeArgs;
use cmd::undercloud::UndercloudArgs;
use cmd::Context;
use overcloud_common::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Overcloud baremetal and upgrade workflows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Config file (default ~/.config/overcloud/config.yaml)
    #[arg(long, global = true, env = "OVERCLOUD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register, introspect and provide baremetal nodes
    Node(NodeArgs),
    /// Fast forward upgrade of the overcloud
    FfwdUpgrade(FfwdUpgradeArgs),
    /// Rolling upgrade of the overcloud ceph cluster
    CephUpgrade(CephUpgradeArgs),
    /// Install or upgrade the undercloud
    Undercloud(UndercloudArgs),
}

/// Respect RUST_LOG, fall back to info (or debug with --verbose) for our crates
fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    let directives = format!(
        "overcloud={level},overcloud_common={level},overcloud_workflow={level},overcloud_upgrade={level},hyper=warn,reqwest=warn,rustls=warn,tungstenite=warn,tokio_tungstenite=warn",
        level = level
    );
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    registry()
        .with(log_filter(cli.verbose))
        .with(fmt::layer().with_writer(stderr))
        .init();

    let settings = Settings::load(cli.config.as_deref())?;
    debug!(workflow_url = %settings.workflow_url, messaging_url = %settings.messaging_url, "Loaded settings");
    let ctx = Context {
        settings,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Node(args) => cmd::node::run(&ctx, args).await,
        Commands::FfwdUpgrade(args) => cmd::ffwd_upgrade::run(&ctx, args).await,
        Commands::CephUpgrade(args) => cmd::ceph_upgrade::run(&ctx, args).await,
        Commands::Undercloud(args) => cmd::undercloud::run(args, ctx.verbose).await,
    }
}
