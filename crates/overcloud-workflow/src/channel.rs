//! Result channels
//!
//! Workflow results are pushed to a pub/sub queue named by the caller. An
//! [`EventChannel`] is subscribed to that queue before the job is submitted
//! and yields exactly one terminal message for one execution id.

use crate::error::{Result, WorkflowError};
use crate::report::{EventReporter, OperationEvent};
use async_trait::async_trait;
use overcloud_common::QueueName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Status field of a workflow message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Success,
    /// Non-terminal progress message
    Running,
    /// Any other status (`ERROR`, `FAILED`, ...)
    Failed(String),
}

impl From<String> for ExecutionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SUCCESS" => ExecutionStatus::Success,
            "RUNNING" => ExecutionStatus::Running,
            _ => ExecutionStatus::Failed(s),
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Success => "SUCCESS".to_string(),
            ExecutionStatus::Running => "RUNNING".to_string(),
            ExecutionStatus::Failed(s) => s,
        }
    }
}

/// The single result message of a workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalMessage {
    pub status: ExecutionStatus,

    /// Human readable message, present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Operation specific fields (`registered_nodes`, `introspected_nodes`, ...)
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TerminalMessage {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// A raw message delivered on a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub payload: Value,
}

impl QueueMessage {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Execution this message belongs to (`execution.id` or `execution_id`)
    pub fn execution_id(&self) -> Option<&str> {
        self.payload
            .pointer("/execution/id")
            .or_else(|| self.payload.get("execution_id"))
            .and_then(Value::as_str)
    }
}

/// A pub/sub transport that can subscribe to named queues
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn subscribe(&self, queue: &QueueName) -> Result<Box<dyn Subscription>>;
}

/// An open subscription to one queue
///
/// Implementations also release the subscription, at least on a best effort
/// basis, when dropped. [`Subscription::close`] is the orderly path.
#[async_trait]
pub trait Subscription: Send {
    /// Next message on the queue; `None` once the transport has closed
    async fn next_message(&mut self) -> Result<Option<QueueMessage>>;

    /// Unsubscribe and release the queue
    async fn close(&mut self) -> Result<()>;
}

/// Scoped subscription that waits for one terminal message
pub struct EventChannel {
    queue: QueueName,
    subscription: Box<dyn Subscription>,
    timeout: Option<Duration>,
}

impl EventChannel {
    /// Subscribe to `queue`
    pub async fn open(bus: &dyn MessageBus, queue: QueueName) -> Result<Self> {
        let subscription = bus.subscribe(&queue).await?;
        debug!(queue = %queue, "Subscribed to queue");
        Ok(Self {
            queue,
            subscription,
            timeout: None,
        })
    }

    /// Give up waiting after `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Block until the terminal message for `execution_id` arrives.
    ///
    /// Messages for other executions are skipped and `RUNNING` messages are
    /// forwarded to `reporter` as progress. The channel is consumed and closed
    /// on every path, so at most one terminal message is ever returned.
    pub async fn wait_for_message(
        mut self,
        workflow: &str,
        execution_id: &str,
        reporter: &dyn EventReporter,
    ) -> Result<TerminalMessage> {
        let result = match self.timeout {
            Some(after) => {
                match tokio::time::timeout(after, self.next_terminal(workflow, execution_id, reporter))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(WorkflowError::Timeout {
                        queue: self.queue.to_string(),
                        after,
                    }),
                }
            }
            None => self.next_terminal(workflow, execution_id, reporter).await,
        };

        self.close().await;
        result
    }

    /// Release the subscription without waiting
    pub async fn close(mut self) {
        if let Err(e) = self.subscription.close().await {
            warn!(queue = %self.queue, error = %e, "Failed to close queue subscription");
        }
    }

    async fn next_terminal(
        &mut self,
        workflow: &str,
        execution_id: &str,
        reporter: &dyn EventReporter,
    ) -> Result<TerminalMessage> {
        loop {
            let Some(message) = self.subscription.next_message().await? else {
                return Err(WorkflowError::ChannelClosed(self.queue.to_string()));
            };

            if message.execution_id() != Some(execution_id) {
                debug!(
                    queue = %self.queue,
                    execution = ?message.execution_id(),
                    "Skipping message for another execution"
                );
                continue;
            }

            let terminal: TerminalMessage = serde_json::from_value(message.payload)
                .map_err(|e| WorkflowError::MalformedMessage(e.to_string()))?;

            if terminal.status == ExecutionStatus::Running {
                if let Some(text) = terminal.message {
                    reporter.report(OperationEvent::Progress {
                        workflow: workflow.to_string(),
                        message: text,
                    });
                }
                continue;
            }

            return Ok(terminal);
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("queue", &self.queue)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

type QueueMap = Arc<Mutex<HashMap<QueueName, broadcast::Sender<QueueMessage>>>>;

/// In-process message bus
///
/// Queues are created on first subscribe and removed when their last
/// subscriber goes away. Messages published to a queue nobody listens on are
/// dropped, as they would be by the real service.
#[derive(Debug, Default, Clone)]
pub struct MemoryBus {
    queues: QueueMap,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a message; returns how many subscribers received it
    pub fn publish(&self, queue: &QueueName, message: QueueMessage) -> usize {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        match queues.get(queue) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of live subscriptions on `queue`
    pub fn subscriber_count(&self, queue: &QueueName) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Number of queues with at least one live subscription
    pub fn queue_count(&self) -> usize {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn subscribe(&self, queue: &QueueName) -> Result<Box<dyn Subscription>> {
        let receiver = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(queue.clone())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe();

        Ok(Box::new(MemorySubscription {
            queue: queue.clone(),
            receiver: Some(receiver),
            queues: self.queues.clone(),
        }))
    }
}

struct MemorySubscription {
    queue: QueueName,
    receiver: Option<broadcast::Receiver<QueueMessage>>,
    queues: QueueMap,
}

impl MemorySubscription {
    fn release(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        drop(receiver);

        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if queues
            .get(&self.queue)
            .is_some_and(|s| s.receiver_count() == 0)
        {
            queues.remove(&self.queue);
        }
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<QueueMessage>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(None);
        };
        loop {
            match receiver.recv().await {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(queue = %self.queue, skipped, "Subscriber lagged, messages dropped");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.release();
    }
}
