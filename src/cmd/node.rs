use super::Context;
use clap::{Args, Subcommand};
use color_eyre::eyre::{eyre, Result};
use overcloud_common::constants::DEFAULT_INTROSPECTION_CONCURRENCY;
use overcloud_workflow::baremetal::{self, IntrospectNodes, RegisterNodes};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommand {
    /// Register or update baremetal nodes from a JSON or YAML file
    Import(ImportArgs),
    /// Make nodes available for deployment
    Provide(ProvideArgs),
    /// Introspect specified nodes or all nodes in 'manageable' state
    Introspect(IntrospectArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Nodes file (a list of nodes, or a mapping with a `nodes` list)
    pub env_file: PathBuf,

    /// Provide (make available) the nodes once registered
    #[arg(long)]
    pub provide: bool,

    /// Deploy kernel image name
    #[arg(long)]
    pub kernel_name: Option<String>,

    /// Deploy ramdisk image name
    #[arg(long)]
    pub ramdisk_name: Option<String>,

    /// Whether to set instances for booting from local hard drive (local) or network (netboot)
    #[arg(long)]
    pub instance_boot_option: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProvideArgs {
    /// Baremetal node UUIDs
    #[arg(required_unless_present = "all_manageable", conflicts_with = "all_manageable")]
    pub node_uuids: Vec<String>,

    /// Provide all nodes currently in 'manageable' state
    #[arg(long)]
    pub all_manageable: bool,
}

#[derive(Args, Debug)]
pub struct IntrospectArgs {
    /// Baremetal node UUIDs
    #[arg(required_unless_present = "all_manageable", conflicts_with = "all_manageable")]
    pub node_uuids: Vec<String>,

    /// Introspect all nodes currently in 'manageable' state
    #[arg(long)]
    pub all_manageable: bool,

    /// Provide (make available) the nodes once introspected
    #[arg(long)]
    pub provide: bool,

    /// Run the pre-deployment validations
    #[arg(long)]
    pub run_validations: bool,

    /// Maximum number of nodes to introspect at once
    #[arg(long, default_value_t = DEFAULT_INTROSPECTION_CONCURRENCY)]
    pub concurrency: u32,
}

pub async fn run(ctx: &Context, args: NodeArgs) -> Result<()> {
    match args.command {
        NodeCommand::Import(args) => import(ctx, args).await,
        NodeCommand::Provide(args) => provide(ctx, args).await,
        NodeCommand::Introspect(args) => introspect(ctx, args).await,
    }
}

async fn import(ctx: &Context, args: ImportArgs) -> Result<()> {
    let nodes_json = read_nodes(&args.env_file)?;
    info!(nodes = nodes_json.len(), file = %args.env_file.display(), "Registering nodes");

    let orchestrator = ctx.orchestrator();
    let registered = baremetal::register_or_update(
        &orchestrator,
        &RegisterNodes {
            nodes_json,
            kernel_name: args.kernel_name,
            ramdisk_name: args.ramdisk_name,
            instance_boot_option: args.instance_boot_option,
        },
    )
    .await?;

    if args.provide {
        let uuids: Vec<String> = registered
            .iter()
            .filter_map(|node| node.get("uuid").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        baremetal::provide(&orchestrator, &uuids).await?;
    }
    Ok(())
}

async fn provide(ctx: &Context, args: ProvideArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    if args.all_manageable {
        baremetal::provide_manageable_nodes(&orchestrator).await?;
    } else {
        baremetal::provide(&orchestrator, &args.node_uuids).await?;
    }
    Ok(())
}

async fn introspect(ctx: &Context, args: IntrospectArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    println!("Waiting for introspection to finish...");

    if args.all_manageable {
        baremetal::introspect_manageable_nodes(&orchestrator).await?;
        println!("Introspection completed.");
        if args.provide {
            baremetal::provide_manageable_nodes(&orchestrator).await?;
        }
        return Ok(());
    }

    let report = baremetal::introspect(
        &orchestrator,
        &IntrospectNodes {
            node_uuids: args.node_uuids,
            run_validations: args.run_validations,
            concurrency: args.concurrency,
        },
    )
    .await?;
    println!("Introspection completed.");

    if args.provide {
        let uuids: Vec<String> = report.successful_ids.into_iter().collect();
        baremetal::provide(&orchestrator, &uuids).await?;
    }
    Ok(())
}

/// Read node definitions. JSON is valid YAML, so one parser covers both.
fn read_nodes(path: &Path) -> Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
    let value: Value = serde_yaml::from_str(&raw)
        .map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))?;

    match value {
        Value::Array(nodes) => Ok(nodes),
        Value::Object(mut map) => match map.remove("nodes") {
            Some(Value::Array(nodes)) => Ok(nodes),
            _ => Err(eyre!("{} has no 'nodes' list", path.display())),
        },
        _ => Err(eyre!("{} must contain a list of nodes", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_nodes_formats() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("nodes.json");
        std::fs::write(&json, r#"{"nodes": [{"name": "node-0"}, {"name": "node-1"}]}"#).unwrap();
        assert_eq!(read_nodes(&json).unwrap().len(), 2);

        let yaml = dir.path().join("nodes.yaml");
        std::fs::write(&yaml, "- name: node-0\n  pm_type: ipmi\n").unwrap();
        let nodes = read_nodes(&yaml).unwrap();
        assert_eq!(nodes[0]["pm_type"], "ipmi");

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "nodes: 3\n").unwrap();
        assert!(read_nodes(&bad).is_err());
    }
}
