//! Queue identity used to correlate a remote workflow with its result messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of the pub/sub queue a single workflow execution reports on.
///
/// Every in-flight execution needs its own queue, otherwise results can be
/// delivered to the wrong waiter. [`QueueName::generate`] is the only way the
/// orchestration layer obtains one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    /// Create a fresh queue name from a random v4 UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing queue name (e.g. one read back from a message).
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
