//! Baremetal node operations
//!
//! Registration, introspection and providing of nodes. Each function is one
//! remote workflow run through the [`Orchestrator`].

use crate::error::{IntrospectionFailure, Result, WorkflowError};
use crate::execution::{to_input, WorkflowInput};
use crate::interpret::{EntityReport, OperationResult, OperationShape};
use crate::operation::{decode, remote, Orchestrator};
use crate::report::OperationEvent;
use overcloud_common::constants::{workflows, DEFAULT_INTROSPECTION_CONCURRENCY};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

const INTROSPECTED_NODES: OperationShape = OperationShape::per_node("introspected_nodes");

/// Input for node registration
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterNodes {
    /// Node definitions as read from the operator's nodes file
    pub nodes_json: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ramdisk_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_boot_option: Option<String>,
}

/// Input for introspecting specific nodes
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectNodes {
    pub node_uuids: Vec<String>,
    pub run_validations: bool,
    pub concurrency: u32,
}

impl IntrospectNodes {
    pub fn new(node_uuids: Vec<String>) -> Self {
        Self {
            node_uuids,
            run_validations: false,
            concurrency: DEFAULT_INTROSPECTION_CONCURRENCY,
        }
    }
}

/// Register new nodes or update existing ones.
///
/// Returns the registered node records in the order the engine sent them.
pub async fn register_or_update(
    orchestrator: &Orchestrator,
    request: &RegisterNodes,
) -> Result<Vec<Value>> {
    let result = orchestrator
        .run(
            workflows::REGISTER_OR_UPDATE,
            to_input(request)?,
            OperationShape::Listed {
                field: "registered_nodes",
            },
            WorkflowError::RegistrationOrUpdate,
        )
        .await?;

    let OperationResult::Listed(nodes) = result else {
        return Err(unexpected(workflows::REGISTER_OR_UPDATE));
    };

    for node in &nodes {
        if let Some(uuid) = node.get("uuid").and_then(Value::as_str) {
            orchestrator.reporter().report(OperationEvent::NodeRegistered {
                uuid: uuid.to_string(),
            });
        }
    }
    Ok(nodes)
}

/// Move nodes to the available state.
///
/// A remote failure is reported rather than raised; the return value says
/// whether every node was made available.
pub async fn provide(orchestrator: &Orchestrator, node_uuids: &[String]) -> Result<bool> {
    let mut input = WorkflowInput::new();
    input.insert("node_uuids".to_string(), node_uuids.into());

    let message = orchestrator.execute(workflows::PROVIDE, input).await?;
    match decode(message, OperationShape::Flat, remote(workflows::PROVIDE)) {
        Ok(_) => {
            info!(nodes = node_uuids.len(), "Successfully set all nodes to available");
            Ok(true)
        }
        Err(WorkflowError::Remote { message, .. }) => {
            orchestrator.reporter().report(OperationEvent::Progress {
                workflow: workflows::PROVIDE.to_string(),
                message: format!("Failed to set nodes to available state: {}", message),
            });
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Introspect every node currently in the manageable state
pub async fn introspect_manageable_nodes(orchestrator: &Orchestrator) -> Result<EntityReport> {
    introspection(
        orchestrator,
        workflows::INTROSPECT_MANAGEABLE_NODES,
        WorkflowInput::new(),
    )
    .await
}

/// Introspect the given nodes
pub async fn introspect(orchestrator: &Orchestrator, request: &IntrospectNodes) -> Result<EntityReport> {
    introspection(orchestrator, workflows::INTROSPECT, to_input(request)?).await
}

/// Provide every node currently in the manageable state
pub async fn provide_manageable_nodes(orchestrator: &Orchestrator) -> Result<Option<String>> {
    let result = orchestrator
        .run(
            workflows::PROVIDE_MANAGEABLE_NODES,
            WorkflowInput::new(),
            OperationShape::Flat,
            remote(workflows::PROVIDE_MANAGEABLE_NODES),
        )
        .await?;

    match result {
        OperationResult::Flat { message } => Ok(message),
        _ => Err(unexpected(workflows::PROVIDE_MANAGEABLE_NODES)),
    }
}

/// Shared per-node aggregation for both introspection workflows.
///
/// Every node outcome is reported before the aggregate error is raised, so
/// the operator sees which nodes succeeded.
async fn introspection(
    orchestrator: &Orchestrator,
    workflow: &'static str,
    input: WorkflowInput,
) -> Result<EntityReport> {
    let result = orchestrator
        .run(workflow, input, INTROSPECTED_NODES, remote(workflow))
        .await?;

    let OperationResult::PerEntity(report) = result else {
        return Err(unexpected(workflow));
    };

    for outcome in &report.outcomes {
        orchestrator.reporter().report(OperationEvent::NodeIntrospected {
            node_id: outcome.node_id.clone(),
            error: outcome.error.clone(),
        });
    }

    if report.has_errors() {
        return Err(WorkflowError::Introspection(IntrospectionFailure {
            successful_ids: report.successful_ids,
            errors: report.errors,
        }));
    }

    info!(nodes = report.total(), "Introspection completed");
    Ok(report)
}

fn unexpected(workflow: &str) -> WorkflowError {
    WorkflowError::MalformedMessage(format!("unexpected result shape from {}", workflow))
}
