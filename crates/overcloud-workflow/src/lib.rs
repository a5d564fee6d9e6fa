//! Overcloud Workflow Engine
//!
//! This crate submits named jobs to the remote workflow service and turns
//! their asynchronous results into plain, blocking-looking calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Orchestrator                         │
//! │  ┌─────────────────────────────────────────────┐    │
//! │  │   EventChannel (opened first, per queue)    │    │
//! │  │   MemoryBus | ZaqarBus (websocket)          │    │
//! │  └─────────────────────────────────────────────┘    │
//! │                      │                               │
//! │                      ▼                               │
//! │  ┌─────────────────────────────────────────────┐    │
//! │  │   WorkflowClient::submit (exactly once)     │    │
//! │  └─────────────────────────────────────────────┘    │
//! │                      │                               │
//! │                      ▼                               │
//! │  ┌─────────────────────────────────────────────┐    │
//! │  │   wait_for_message -> interpret             │    │
//! │  │   Flat | PerEntity | Listed                 │    │
//! │  └─────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use overcloud_workflow::{baremetal, MemoryBus, MistralClient, Orchestrator};
//! use std::sync::Arc;
//!
//! let client = Arc::new(MistralClient::new("http://192.168.24.1:8989/v2"));
//! let orchestrator = Orchestrator::new(client, Arc::new(MemoryBus::new()));
//!
//! let report = baremetal::introspect_manageable_nodes(&orchestrator).await?;
//! println!("{} nodes introspected", report.successful_ids.len());
//! ```
//!
//! # Limitations
//!
//! There is no cancellation. Once submitted, a job runs to completion on the
//! remote side; killing this process orphans it.

pub mod baremetal;
pub mod channel;
pub mod config_download;
pub mod deployment;
pub mod error;
pub mod execution;
pub mod interpret;
pub mod operation;
pub mod package_update;
pub mod report;
pub mod stack;
pub mod websocket;

pub use channel::{
    EventChannel, ExecutionStatus, MemoryBus, MessageBus, QueueMessage, Subscription,
    TerminalMessage,
};
pub use config_download::ConfigDownloader;
pub use error::{IntrospectionFailure, Result, WorkflowError};
pub use execution::{ExecutionHandle, MistralClient, WorkflowClient, WorkflowInput};
pub use interpret::{interpret, EntityReport, NodeOutcome, OperationResult, OperationShape};
pub use operation::Orchestrator;
pub use report::{CollectingReporter, EventReporter, NoopReporter, OperationEvent, TracingReporter};
pub use stack::{HeatStackStore, MemoryStackStore, StackStore};
pub use websocket::ZaqarBus;
