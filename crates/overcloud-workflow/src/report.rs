//! Reporting of operation progress
//!
//! Operations never print. They emit [`OperationEvent`]s to an injected
//! [`EventReporter`], and the CLI decides how to render them.

use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Something an operation wants the operator to know about
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OperationEvent {
    /// A workflow execution was accepted by the remote engine
    Submitted {
        workflow: String,
        execution_id: String,
        queue: String,
    },

    /// A non-terminal message arrived (e.g. ansible output)
    Progress { workflow: String, message: String },

    /// The terminal message was received
    Completed {
        workflow: String,
        success: bool,
        message: Option<String>,
    },

    /// A node was registered or updated
    NodeRegistered { uuid: String },

    /// Introspection finished for one node
    NodeIntrospected { node_id: String, error: Option<String> },

    /// A software deployment finished on one server
    ServerDeployed { server: String, error: Option<String> },
}

/// Trait for types that receive operation events
pub trait EventReporter: Send + Sync {
    fn report(&self, event: OperationEvent);
}

/// Discards all events
#[derive(Debug, Default, Clone)]
pub struct NoopReporter;

impl EventReporter for NoopReporter {
    fn report(&self, _event: OperationEvent) {}
}

/// Renders events as log lines
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

impl EventReporter for TracingReporter {
    fn report(&self, event: OperationEvent) {
        match event {
            OperationEvent::Submitted {
                workflow,
                execution_id,
                queue,
            } => info!(workflow = %workflow, execution = %execution_id, queue = %queue, "Workflow submitted"),
            OperationEvent::Progress { workflow, message } => {
                info!(workflow = %workflow, "{}", message)
            }
            OperationEvent::Completed {
                workflow,
                success: true,
                message,
            } => info!(workflow = %workflow, message = ?message, "Workflow finished"),
            OperationEvent::Completed {
                workflow,
                success: false,
                message,
            } => warn!(workflow = %workflow, message = ?message, "Workflow failed"),
            OperationEvent::NodeRegistered { uuid } => {
                info!(node = %uuid, "Successfully registered node")
            }
            OperationEvent::NodeIntrospected {
                node_id,
                error: None,
            } => info!(node = %node_id, "Introspection finished successfully"),
            OperationEvent::NodeIntrospected {
                node_id,
                error: Some(error),
            } => warn!(node = %node_id, error = %error, "Introspection finished with error"),
            OperationEvent::ServerDeployed {
                server,
                error: None,
            } => info!(server = %server, "Deployment succeeded"),
            OperationEvent::ServerDeployed {
                server,
                error: Some(error),
            } => warn!(server = %server, error = %error, "Deployment failed"),
        }
    }
}

/// A reporter that collects all events
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<OperationEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OperationEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventReporter for CollectingReporter {
    fn report(&self, event: OperationEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::new();
        reporter.report(OperationEvent::NodeRegistered {
            uuid: "a".to_string(),
        });
        reporter.report(OperationEvent::NodeRegistered {
            uuid: "b".to_string(),
        });

        assert_eq!(reporter.events().len(), 2);
        reporter.clear();
        assert!(reporter.events().is_empty());
    }
}
