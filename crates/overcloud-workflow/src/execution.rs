//! Workflow submission
//!
//! A [`WorkflowClient`] hands a named job and its input to the remote engine
//! and returns an [`ExecutionHandle`]. Results never come back on this path;
//! they arrive on the job's queue (see [`crate::channel`]).

use crate::error::{Result, WorkflowError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Submission parameters for a workflow
pub type WorkflowInput = serde_json::Map<String, Value>;

/// One submitted remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// Identifier assigned by the remote engine
    pub id: String,

    /// Which named workflow was started
    pub workflow_name: String,

    /// The input it was started with
    pub input: WorkflowInput,
}

/// Client for the remote workflow engine
///
/// Submissions are never retried. The engine gives no idempotency guarantee,
/// so a retry could start the same job twice.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start a workflow execution
    async fn submit(&self, workflow_name: &str, input: WorkflowInput) -> Result<ExecutionHandle>;

    /// Run a single action synchronously and return its result
    async fn run_action(&self, action_name: &str, input: WorkflowInput) -> Result<Value>;
}

/// Serialize a request struct into workflow input
pub fn to_input<T: Serialize>(value: &T) -> Result<WorkflowInput> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(WorkflowError::MalformedMessage(format!(
            "workflow input must be an object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ExecutionResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ActionExecutionResponse {
    #[serde(default)]
    state: String,
    #[serde(default)]
    output: Option<String>,
}

/// HTTP client for the Mistral v2 API
#[derive(Debug, Clone)]
pub struct MistralClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl MistralClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(format!("{}/{}", self.base_url, path));
        match &self.auth_token {
            Some(token) => request.header("X-Auth-Token", token),
            None => request,
        }
    }

    /// Map an HTTP error status. Auth failures are transport problems; any
    /// other rejection carries the response body.
    async fn check(response: Response, what: &str) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WorkflowError::Transport(
                format!("{} rejected with HTTP {}: {}", what, status, body),
            )),
            _ => Err(WorkflowError::Remote {
                workflow: what.to_string(),
                message: format!("HTTP {}: {}", status, body),
            }),
        }
    }
}

#[async_trait]
impl WorkflowClient for MistralClient {
    async fn submit(&self, workflow_name: &str, input: WorkflowInput) -> Result<ExecutionHandle> {
        debug!(workflow = %workflow_name, "Submitting workflow execution");

        let response = self
            .post("executions")
            .json(&json!({
                "workflow_name": workflow_name,
                "input": serde_json::to_string(&input)?,
            }))
            .send()
            .await?;

        let body = Self::check(response, workflow_name).await?;
        let execution: ExecutionResponse = serde_json::from_str(&body).map_err(|e| {
            WorkflowError::MalformedMessage(format!("execution response: {}: {}", e, body))
        })?;

        Ok(ExecutionHandle {
            id: execution.id,
            workflow_name: workflow_name.to_string(),
            input,
        })
    }

    async fn run_action(&self, action_name: &str, input: WorkflowInput) -> Result<Value> {
        debug!(action = %action_name, "Running action");

        let response = self
            .post("action_executions")
            .json(&json!({
                "name": action_name,
                "input": input,
                "params": {"save_result": false, "run_sync": true},
            }))
            .send()
            .await?;

        let body = Self::check(response, action_name).await?;
        let execution: ActionExecutionResponse = serde_json::from_str(&body).map_err(|e| {
            WorkflowError::MalformedMessage(format!("action response: {}: {}", e, body))
        })?;

        let output: Value = match execution.output.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Value::Null,
        };

        if execution.state != "SUCCESS" {
            return Err(WorkflowError::Remote {
                workflow: action_name.to_string(),
                message: output
                    .get("result")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| output.to_string()),
            });
        }

        Ok(output.get("result").cloned().unwrap_or(Value::Null))
    }
}
