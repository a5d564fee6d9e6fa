//! Result interpretation
//!
//! Pure decoding and classification of terminal messages. Nothing in here
//! talks to the network or prints; operations decide what to raise and the
//! reporter decides what to show.

use crate::channel::TerminalMessage;
use serde_json::Value;
use std::collections::BTreeSet;

/// How to decode the payload of a terminal message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationShape {
    /// Status and message only
    Flat,

    /// Mapping of entity id to outcome, under `field`
    PerEntity {
        field: &'static str,
        classifier: Classifier,
    },

    /// Ordered sequence of created records, under `field`
    Listed { field: &'static str },
}

impl OperationShape {
    /// Per-entity shape where each outcome is `{"error": null | "..."}`
    pub const fn per_node(field: &'static str) -> Self {
        OperationShape::PerEntity {
            field,
            classifier: Classifier::NodeError,
        }
    }

    /// Per-entity shape over software deployment results
    pub const fn per_server(field: &'static str) -> Self {
        OperationShape::PerEntity {
            field,
            classifier: Classifier::DeployStatus,
        }
    }
}

/// How to tell a failed entity from a successful one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classifier {
    /// `error` field, null or absent on success
    NodeError,
    /// `deploy_status_code`, zero on success
    DeployStatus,
}

impl Classifier {
    pub fn classify(&self, outcome: &Value) -> Option<String> {
        match self {
            Classifier::NodeError => node_error(outcome),
            Classifier::DeployStatus => deployment_error(outcome),
        }
    }
}

/// Outcome for a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub node_id: String,
    pub error: Option<String>,
}

/// Aggregated per-entity outcomes
///
/// Every entity ends up in exactly one of `successful_ids` or `errors`.
/// `errors` keeps the iteration order of the source mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityReport {
    pub outcomes: Vec<NodeOutcome>,
    pub successful_ids: BTreeSet<String>,
    pub errors: Vec<String>,
}

impl EntityReport {
    fn push(&mut self, outcome: NodeOutcome) {
        match &outcome.error {
            None => {
                self.successful_ids.insert(outcome.node_id.clone());
            }
            Some(error) => self.errors.push(format!("{}: {}", outcome.node_id, error)),
        }
        self.outcomes.push(outcome);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Decoded result of a successful execution
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Flat { message: Option<String> },
    PerEntity(EntityReport),
    Listed(Vec<Value>),
}

/// Why a terminal message could not be turned into a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Non-success status, with the remote message verbatim
    Remote(String),

    /// Success status but the payload was not the expected shape
    Malformed(String),
}

/// Decode `message` according to `shape`.
///
/// A non-success status is always a [`Rejection::Remote`]; no partial result
/// is extracted from a failed envelope.
pub fn interpret(
    message: TerminalMessage,
    shape: OperationShape,
) -> Result<OperationResult, Rejection> {
    if !message.is_success() {
        return Err(Rejection::Remote(message.message.unwrap_or_default()));
    }

    match shape {
        OperationShape::Flat => Ok(OperationResult::Flat {
            message: message.message,
        }),
        OperationShape::Listed { field } => match message.payload.get(field) {
            Some(Value::Array(items)) => Ok(OperationResult::Listed(items.clone())),
            Some(other) => Err(Rejection::Malformed(format!(
                "'{}' should be a list, got {}",
                field, other
            ))),
            None => Err(Rejection::Malformed(format!("missing '{}'", field))),
        },
        OperationShape::PerEntity { field, classifier } => match message.payload.get(field) {
            Some(Value::Object(entities)) => {
                let mut report = EntityReport::default();
                for (node_id, outcome) in entities {
                    report.push(NodeOutcome {
                        node_id: node_id.clone(),
                        error: classifier.classify(outcome),
                    });
                }
                Ok(OperationResult::PerEntity(report))
            }
            Some(other) => Err(Rejection::Malformed(format!(
                "'{}' should be a mapping, got {}",
                field, other
            ))),
            None => Err(Rejection::Malformed(format!("missing '{}'", field))),
        },
    }
}

/// Read the `error` field of a node outcome; null or absent means success
pub fn node_error(outcome: &Value) -> Option<String> {
    match outcome.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Classify a software deployment result by its exit status
pub fn deployment_error(outcome: &Value) -> Option<String> {
    let code = outcome
        .get("deploy_status_code")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if code == 0 {
        return None;
    }
    let stderr = outcome
        .get("deploy_stderr")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();
    Some(if stderr.is_empty() {
        format!("exit status {}", code)
    } else {
        format!("exit status {}: {}", code, stderr)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn terminal(value: Value) -> TerminalMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_failed_status_is_rejected_verbatim() {
        let msg = terminal(json!({
            "status": "ERROR",
            "message": "boom",
            "introspected_nodes": {"n1": {"error": null}}
        }));
        assert_eq!(
            interpret(msg, OperationShape::per_node("introspected_nodes")),
            Err(Rejection::Remote("boom".to_string()))
        );
    }

    #[test]
    fn test_listed_returns_sequence_verbatim() {
        let msg = terminal(json!({
            "status": "SUCCESS",
            "registered_nodes": [{"uuid": "a"}, {"uuid": "b"}]
        }));
        assert_eq!(
            interpret(msg, OperationShape::Listed { field: "registered_nodes" }),
            Ok(OperationResult::Listed(vec![json!({"uuid": "a"}), json!({"uuid": "b"})]))
        );
    }

    #[test]
    fn test_listed_missing_field() {
        let msg = terminal(json!({"status": "SUCCESS"}));
        assert!(matches!(
            interpret(msg, OperationShape::Listed { field: "registered_nodes" }),
            Err(Rejection::Malformed(_))
        ));
    }

    #[test]
    fn test_per_entity_partitions_every_node() {
        let msg = terminal(json!({
            "status": "SUCCESS",
            "introspected_nodes": {
                "n3": {"error": "no power"},
                "n1": {"error": null},
                "n2": {"error": "timeout"},
                "n4": {}
            }
        }));

        let Ok(OperationResult::PerEntity(report)) =
            interpret(msg, OperationShape::per_node("introspected_nodes"))
        else {
            panic!("expected per-entity result");
        };

        assert_eq!(report.total(), 4);
        assert_eq!(report.successful_ids.len() + report.errors.len(), 4);
        assert_eq!(
            report.successful_ids,
            ["n1", "n4"].iter().map(|s| s.to_string()).collect()
        );
        // Source order, not sorted
        assert_eq!(report.errors, vec!["n3: no power", "n2: timeout"]);
    }

    #[test]
    fn test_per_entity_all_successful() {
        let msg = terminal(json!({
            "status": "SUCCESS",
            "introspected_nodes": {"n1": {"error": null}}
        }));
        let Ok(OperationResult::PerEntity(report)) =
            interpret(msg, OperationShape::per_node("introspected_nodes"))
        else {
            panic!("expected per-entity result");
        };
        assert!(!report.has_errors());
    }

    #[test]
    fn test_flat_keeps_message() {
        let msg = terminal(json!({"status": "SUCCESS", "message": "All nodes available"}));
        assert_eq!(
            interpret(msg, OperationShape::Flat),
            Ok(OperationResult::Flat {
                message: Some("All nodes available".to_string())
            })
        );
    }

    #[test]
    fn test_deployment_error_classification() {
        assert_eq!(deployment_error(&json!({"deploy_status_code": 0})), None);
        assert_eq!(
            deployment_error(&json!({"deploy_status_code": 2, "deploy_stderr": "no repo\n"})),
            Some("exit status 2: no repo".to_string())
        );
        assert_eq!(
            deployment_error(&json!({"deploy_status_code": 1})),
            Some("exit status 1".to_string())
        );
    }
}
