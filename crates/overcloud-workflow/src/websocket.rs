//! Websocket transport for the messaging service
//!
//! Each subscription owns its own websocket connection. The queue is created
//! and subscribed on open, and deleted again on close.

use crate::channel::{MessageBus, QueueMessage, Subscription};
use crate::error::{Result, WorkflowError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use overcloud_common::QueueName;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a queue subscription lives on the server side, in seconds
const SUBSCRIPTION_TTL: u64 = 10_000;

/// Message bus backed by the messaging service's websocket API
#[derive(Debug, Clone)]
pub struct ZaqarBus {
    url: String,
    auth_token: Option<String>,
    project_id: Option<String>,
}

impl ZaqarBus {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            project_id: None,
        }
    }

    pub fn with_credentials(mut self, auth_token: Option<String>, project_id: Option<String>) -> Self {
        self.auth_token = auth_token;
        self.project_id = project_id;
        self
    }

    fn headers(&self, client_id: &str) -> Value {
        let mut headers = json!({ "Client-ID": client_id });
        if let Some(token) = &self.auth_token {
            headers["X-Auth-Token"] = json!(token);
        }
        if let Some(project) = &self.project_id {
            headers["X-Project-ID"] = json!(project);
        }
        headers
    }
}

#[async_trait]
impl MessageBus for ZaqarBus {
    async fn subscribe(&self, queue: &QueueName) -> Result<Box<dyn Subscription>> {
        let (socket, _) = connect_async(self.url.as_str()).await?;
        let mut subscription = ZaqarSubscription {
            queue: queue.clone(),
            headers: self.headers(&Uuid::new_v4().to_string()),
            socket: Some(socket),
        };

        subscription.request("authenticate", Value::Null).await?;
        subscription
            .request("queue_create", json!({ "queue_name": queue.as_str() }))
            .await?;
        subscription
            .request(
                "subscription_create",
                json!({ "queue_name": queue.as_str(), "ttl": SUBSCRIPTION_TTL }),
            )
            .await?;

        debug!(queue = %queue, url = %self.url, "Websocket subscription created");
        Ok(Box::new(subscription))
    }
}

struct ZaqarSubscription {
    queue: QueueName,
    headers: Value,
    socket: Option<Socket>,
}

impl ZaqarSubscription {
    /// Send an action and wait for its response frame
    async fn request(&mut self, action: &str, body: Value) -> Result<Value> {
        let frame = request_frame(action, &self.headers, body);

        let Some(socket) = self.socket.as_mut() else {
            return Err(WorkflowError::ChannelClosed(self.queue.to_string()));
        };
        socket.send(Message::Text(frame.to_string())).await?;

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return check_response(action, &self.queue, &text),
                Some(Ok(Message::Close(_))) | None => {
                    return Err(WorkflowError::ChannelClosed(self.queue.to_string()))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Subscription for ZaqarSubscription {
    async fn next_message(&mut self) -> Result<Option<QueueMessage>> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(None);
        };

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => match notification(&text)? {
                    Some(message) => return Ok(Some(message)),
                    None => debug!(queue = %self.queue, "Ignoring non-notification frame"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.socket.is_none() {
            return Ok(());
        }

        let deleted = self.request("queue_delete", queue_body(&self.queue)).await;
        if let Err(e) = &deleted {
            warn!(queue = %self.queue, error = %e, "Failed to delete queue");
        }

        if let Some(mut socket) = self.socket.take() {
            socket.close(None).await?;
        }
        deleted.map(|_| ())
    }
}

impl Drop for ZaqarSubscription {
    /// Best effort: ask for the queue to be deleted without waiting for the reply
    fn drop(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };
        let frame = request_frame("queue_delete", &self.headers, queue_body(&self.queue));
        let queue = self.queue.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = socket.send(Message::Text(frame.to_string())).await {
                        debug!(queue = %queue, error = %e, "Queue delete on drop failed");
                    }
                    let _ = socket.close(None).await;
                });
            }
            Err(_) => warn!(queue = %queue, "Subscription dropped outside a runtime, queue left behind"),
        }
    }
}

fn queue_body(queue: &QueueName) -> Value {
    json!({ "queue_name": queue.as_str() })
}

/// Request frame for `action`. A null body is omitted.
fn request_frame(action: &str, headers: &Value, body: Value) -> Value {
    let mut frame = json!({ "action": action, "headers": headers });
    if !body.is_null() {
        frame["body"] = body;
    }
    frame
}

/// Decode a response frame. A status of 400 or above is a transport failure.
fn check_response(action: &str, queue: &QueueName, text: &str) -> Result<Value> {
    let response: Value = serde_json::from_str(text)?;
    let status = response
        .pointer("/response/headers/status")
        .and_then(Value::as_u64)
        .unwrap_or(200);
    if status >= 400 {
        return Err(WorkflowError::Transport(format!(
            "{} on queue '{}' failed with status {}: {}",
            action, queue, status, response
        )));
    }
    Ok(response)
}

/// The queue message carried by a notification frame, `None` for anything else
fn notification(text: &str) -> Result<Option<QueueMessage>> {
    let frame: Value = serde_json::from_str(text)?;
    Ok(frame
        .pointer("/body/payload")
        .map(|payload| QueueMessage::new(payload.clone())))
}
