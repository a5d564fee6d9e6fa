//! Submit-and-await composition shared by every orchestration operation

use crate::channel::{EventChannel, MessageBus, TerminalMessage};
use crate::error::{Result, WorkflowError};
use crate::execution::{WorkflowClient, WorkflowInput};
use crate::interpret::{interpret, OperationResult, OperationShape, Rejection};
use crate::report::{EventReporter, OperationEvent, TracingReporter};
use overcloud_common::QueueName;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Runs remote workflows as single blocking calls.
///
/// Each call generates a fresh queue, subscribes to it, submits the workflow
/// exactly once and waits for exactly one terminal message. There is no
/// polling and no retry.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn WorkflowClient>,
    bus: Arc<dyn MessageBus>,
    reporter: Arc<dyn EventReporter>,
    wait_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn WorkflowClient>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            client,
            bus,
            reporter: Arc::new(TracingReporter),
            wait_timeout: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn EventReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Limit how long to wait for each result. `None` waits forever.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn reporter(&self) -> &dyn EventReporter {
        self.reporter.as_ref()
    }

    /// Run `workflow_name` and return its terminal message.
    ///
    /// The generated queue name is added to `input` as `queue_name`.
    pub async fn execute(&self, workflow_name: &str, input: WorkflowInput) -> Result<TerminalMessage> {
        self.execute_on(workflow_name, input, &["queue_name"]).await
    }

    /// Like [`Orchestrator::execute`], for workflows that also stream ansible
    /// output; the same queue is passed as `ansible_queue_name`.
    pub async fn execute_streaming(
        &self,
        workflow_name: &str,
        input: WorkflowInput,
    ) -> Result<TerminalMessage> {
        self.execute_on(workflow_name, input, &["queue_name", "ansible_queue_name"])
            .await
    }

    /// Run `workflow_name` and decode its result according to `shape`.
    ///
    /// `on_rejection` builds the operation's typed error from the remote
    /// message of a failed execution.
    pub async fn run<F>(
        &self,
        workflow_name: &str,
        input: WorkflowInput,
        shape: OperationShape,
        on_rejection: F,
    ) -> Result<OperationResult>
    where
        F: FnOnce(String) -> WorkflowError,
    {
        let message = self.execute(workflow_name, input).await?;
        decode(message, shape, on_rejection)
    }

    /// Run a single action synchronously
    pub async fn run_action(&self, action_name: &str, input: WorkflowInput) -> Result<Value> {
        self.client.run_action(action_name, input).await
    }

    async fn execute_on(
        &self,
        workflow_name: &str,
        mut input: WorkflowInput,
        queue_keys: &[&str],
    ) -> Result<TerminalMessage> {
        let queue = QueueName::generate();
        for key in queue_keys {
            input.insert(key.to_string(), Value::String(queue.to_string()));
        }

        let channel = EventChannel::open(self.bus.as_ref(), queue.clone())
            .await?
            .with_timeout(self.wait_timeout);

        let handle = match self.client.submit(workflow_name, input).await {
            Ok(handle) => handle,
            Err(e) => {
                channel.close().await;
                return Err(e);
            }
        };

        info!(workflow = %workflow_name, execution = %handle.id, queue = %queue, "Waiting for workflow result");
        self.reporter.report(OperationEvent::Submitted {
            workflow: workflow_name.to_string(),
            execution_id: handle.id.clone(),
            queue: queue.to_string(),
        });

        let message = channel
            .wait_for_message(workflow_name, &handle.id, self.reporter.as_ref())
            .await?;

        debug!(workflow = %workflow_name, status = ?message.status, "Received terminal message");
        self.reporter.report(OperationEvent::Completed {
            workflow: workflow_name.to_string(),
            success: message.is_success(),
            message: message.message.clone(),
        });

        Ok(message)
    }
}

/// Interpret a terminal message, mapping rejections to typed errors
pub fn decode<F>(
    message: TerminalMessage,
    shape: OperationShape,
    on_rejection: F,
) -> Result<OperationResult>
where
    F: FnOnce(String) -> WorkflowError,
{
    interpret(message, shape).map_err(|rejection| match rejection {
        Rejection::Remote(message) => on_rejection(message),
        Rejection::Malformed(reason) => WorkflowError::MalformedMessage(reason),
    })
}

/// Build the generic rejection error for `workflow`
pub fn remote(workflow: &str) -> impl FnOnce(String) -> WorkflowError + '_ {
    move |message| WorkflowError::Remote {
        workflow: workflow.to_string(),
        message,
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::channel::MemoryBus;
    use serde_json::json;

    /// Refuses every submission, noting the queue it was asked to report on
    struct FailingClient {
        bus: MemoryBus,
        queue: std::sync::Mutex<Option<(QueueName, usize)>>,
    }

    #[async_trait::async_trait]
    impl WorkflowClient for FailingClient {
        async fn submit(&self, _: &str, input: WorkflowInput) -> Result<crate::ExecutionHandle> {
            let queue = QueueName::new(input["queue_name"].as_str().unwrap());
            let subscribers = self.bus.subscriber_count(&queue);
            *self.queue.lock().unwrap() = Some((queue, subscribers));
            Err(WorkflowError::Transport("connection refused".to_string()))
        }

        async fn run_action(&self, _: &str, _: WorkflowInput) -> Result<Value> {
            Err(WorkflowError::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_execute_submits_once_with_queue() {
        let (orchestrator, engine, reporter, _bus) = orchestrator();
        engine.respond(json!({"status": "SUCCESS", "message": "done"}));

        let message = orchestrator
            .execute("tripleo.baremetal.v1.provide", WorkflowInput::new())
            .await
            .unwrap();

        assert!(message.is_success());
        assert_eq!(engine.submission_count(), 1);
        assert!(engine.last_input()["queue_name"].is_string());
        assert!(matches!(
            reporter.events().as_slice(),
            [OperationEvent::Submitted { .. }, OperationEvent::Completed { success: true, .. }]
        ));
    }

    #[tokio::test]
    async fn test_each_execution_uses_a_fresh_queue() {
        let (orchestrator, engine, _reporter, _bus) = orchestrator();
        engine.respond(json!({"status": "SUCCESS"}));
        engine.respond(json!({"status": "SUCCESS"}));

        orchestrator.execute("wf", WorkflowInput::new()).await.unwrap();
        orchestrator.execute("wf", WorkflowInput::new()).await.unwrap();

        let submissions = engine.submissions.lock().unwrap();
        assert_ne!(
            submissions[0].input["queue_name"],
            submissions[1].input["queue_name"]
        );
    }

    #[tokio::test]
    async fn test_streaming_passes_ansible_queue() {
        let (orchestrator, engine, reporter, _bus) = orchestrator();
        engine
            .stream("PLAY [overcloud]")
            .respond(json!({"status": "SUCCESS"}));

        orchestrator
            .execute_streaming("wf", WorkflowInput::new())
            .await
            .unwrap();

        let input = engine.last_input();
        assert_eq!(input["queue_name"], input["ansible_queue_name"]);
        assert!(reporter.events().contains(&OperationEvent::Progress {
            workflow: "wf".to_string(),
            message: "PLAY [overcloud]".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_submit_failure_releases_queue() {
        let bus = MemoryBus::new();
        let client = Arc::new(FailingClient {
            bus: bus.clone(),
            queue: std::sync::Mutex::new(None),
        });
        let orchestrator = Orchestrator::new(client.clone(), Arc::new(bus.clone()));

        let err = orchestrator
            .execute("wf", WorkflowInput::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Transport(_)));
        let (queue, subscribers_at_submit) = client.queue.lock().unwrap().clone().unwrap();
        assert_eq!(subscribers_at_submit, 1);
        assert_eq!(bus.subscriber_count(&queue), 0);
        assert_eq!(bus.queue_count(), 0);
    }

    #[tokio::test]
    async fn test_no_result_times_out() {
        let (orchestrator, engine, _reporter, _bus) = orchestrator();
        let orchestrator = orchestrator.with_wait_timeout(Some(Duration::from_millis(20)));

        let err = orchestrator
            .execute("wf", WorkflowInput::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Timeout { .. }));
        assert_eq!(engine.submission_count(), 1);
    }

    #[test]
    fn test_decode_maps_rejection() {
        let message: TerminalMessage =
            serde_json::from_value(json!({"status": "FAILED", "message": "boom"})).unwrap();
        let err = decode(message, OperationShape::Flat, remote("wf")).unwrap_err();
        assert!(matches!(err, WorkflowError::Remote { ref workflow, .. } if workflow == "wf"));
        assert_eq!(err.to_string(), "boom");
    }
}
