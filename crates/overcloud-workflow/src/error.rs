//! Error types for workflow execution
//!
//! Transport problems, timeouts and remote rejections are kept apart so that
//! callers can tell "the job failed" from "we never heard back".

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type for workflow execution
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Submission or subscription failed at the network/auth layer
    #[error("transport error: {0}")]
    Transport(String),

    /// No terminal message arrived in time
    #[error("timed out after {after:?} waiting for a result on queue '{queue}'")]
    Timeout { queue: String, after: Duration },

    /// The transport closed the queue before a terminal message arrived
    #[error("queue '{0}' closed before a result was received")]
    ChannelClosed(String),

    /// The workflow finished with a non-success status
    #[error("{message}")]
    Remote { workflow: String, message: String },

    /// Node registration finished with a non-success status
    #[error("{0}")]
    RegistrationOrUpdate(String),

    /// One or more nodes failed introspection
    #[error("{0}")]
    Introspection(IntrospectionFailure),

    /// A deployment or package update step failed
    #[error("{0}")]
    Deployment(String),

    /// A message did not have the expected shape
    #[error("malformed workflow message: {0}")]
    MalformedMessage(String),

    /// Local file access failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

impl WorkflowError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        WorkflowError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// The message reported by the remote engine, for rejections
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            WorkflowError::Remote { message, .. }
            | WorkflowError::RegistrationOrUpdate(message)
            | WorkflowError::Deployment(message) => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WorkflowError {
    fn from(err: reqwest::Error) -> Self {
        WorkflowError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WorkflowError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        WorkflowError::Transport(err.to_string())
    }
}

/// Aggregate introspection failure.
///
/// Carries the nodes that did succeed alongside the per-node error lines, so
/// the caller can still act on the successful subset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntrospectionFailure {
    pub successful_ids: BTreeSet<String>,
    pub errors: Vec<String>,
}

impl fmt::Display for IntrospectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Introspection completed with errors:\n{}",
            self.errors.join("\n")
        )
    }
}
