//! Read access to deployed stacks

use crate::error::{Result, WorkflowError};
use async_trait::async_trait;
use overcloud_common::Stack;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Source of stack records
#[async_trait]
pub trait StackStore: Send + Sync {
    /// Look up a stack by name or id; `None` if it does not exist
    async fn get_stack(&self, name_or_id: &str) -> Result<Option<Stack>>;
}

#[derive(Debug, Deserialize)]
struct StackEnvelope {
    stack: Stack,
}

/// Orchestration service client
#[derive(Debug, Clone)]
pub struct HeatStackStore {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HeatStackStore {
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
}

#[async_trait]
impl StackStore for HeatStackStore {
    async fn get_stack(&self, name_or_id: &str) -> Result<Option<Stack>> {
        let url = format!("{}/stacks/{}", self.base_url, name_or_id);
        debug!(url = %url, "Fetching stack");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.header("X-Auth-Token", token);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(WorkflowError::Transport(format!(
                "fetching stack '{}' failed with HTTP {}: {}",
                name_or_id, status, body
            )));
        }

        let envelope: StackEnvelope = serde_json::from_str(&body)
            .map_err(|e| WorkflowError::MalformedMessage(format!("stack response: {}", e)))?;
        Ok(Some(envelope.stack))
    }
}

/// In-memory stack store for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStackStore {
    stacks: Arc<Mutex<HashMap<String, Stack>>>,
}

impl MemoryStackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, stack: Stack) {
        if let Ok(mut stacks) = self.stacks.lock() {
            stacks.insert(stack.stack_name.clone(), stack);
        }
    }
}

#[async_trait]
impl StackStore for MemoryStackStore {
    async fn get_stack(&self, name_or_id: &str) -> Result<Option<Stack>> {
        let stacks = self
            .stacks
            .lock()
            .map_err(|_| WorkflowError::Transport("stack store lock poisoned".to_string()))?;
        Ok(stacks
            .get(name_or_id)
            .or_else(|| stacks.values().find(|s| s.id == name_or_id))
            .cloned())
    }
}
