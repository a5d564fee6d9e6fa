//! Error types for upgrade phases

use overcloud_workflow::WorkflowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpgradeError {
    /// A remote workflow failed or could not be reached
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("stack '{0}' not found")]
    StackNotFound(String),

    /// The deploy delegation or a deployment subprocess failed
    #[error("deployment failed: {0}")]
    Deployment(String),

    /// The upgrade playbook failed
    #[error("ansible run failed: {0}")]
    Ansible(String),

    /// A local command could not be run or exited non-zero
    #[error("'{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] overcloud_common::Error),
}

impl UpgradeError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        UpgradeError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, UpgradeError>;
