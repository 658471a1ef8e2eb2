#![allow(clippy::doc_markdown)] // Allow technical terms like ShardContext, TaskList in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Transfer Queue
//!
//! Per-shard transfer queue processor for a workflow engine.
//!
//! ## Overview
//!
//! When a workflow execution changes state, the history service appends *transfer
//! tasks* to a durable, per-shard queue: "schedule this activity", "schedule this
//! decision", "record that this run closed", "delete this run". This crate owns the
//! other side of that queue. It scans tasks in `task_id` order, routes each one to the
//! service that acts on it, and advances a persisted cursor only past tasks that were
//! processed successfully.
//!
//! ## Architecture
//!
//! ```text
//!   TransferQueueStore ──scan──▶ QueueReader ──bounded channel──▶ workers ──▶ MatchingClient
//!                                     │                               │   ├──▶ VisibilityManager
//!                                     └──register──▶ AckManager ◀─────┘   └──▶ ExecutionStore
//!                                                        │
//!                                       ShardContext ◀───┘ (ack level)
//! ```
//!
//! ## Guarantees
//!
//! - **At-least-once delivery**: a task is re-dispatched after a crash that happened
//!   before its ack level was persisted; downstream adds are keyed by
//!   `(execution, schedule_id)`
//! - **Cursor monotonicity**: the read level never decreases and never passes an
//!   unprocessed task or the max allowed read level
//! - **Run-scoped deletion**: a delete task only ever removes the run it names
//!
//! ## Module Organization
//!
//! - [`processor`] - Backoff, reader, executor, ack manager and control loop
//! - [`models`] - Transfer task records and workflow execution state
//! - [`persistence`] - Queue store, execution store and shard context interfaces
//! - [`clients`] - Matching and visibility client interfaces
//! - [`resilience`] - Retry policy and circuit breaker
//! - [`config`] - Layered YAML + environment configuration
//! - [`logging`] - Structured tracing setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transfer_queue::config::ConfigManager;
//! use transfer_queue::clients::{MatchingClient, VisibilityManager};
//! use transfer_queue::persistence::{InMemoryExecutionStore, InMemoryShard, InMemoryTransferQueue};
//! use transfer_queue::TransferQueueProcessor;
//!
//! # async fn example(
//! #     matching: Arc<dyn MatchingClient>,
//! #     visibility: Arc<dyn VisibilityManager>,
//! # ) -> transfer_queue::Result<()> {
//! let manager = ConfigManager::load()?;
//! transfer_queue::logging::init_structured_logging(&manager.config().logging);
//!
//! let processor = TransferQueueProcessor::from_config(
//!     Arc::new(InMemoryShard::new(1)),
//!     Arc::new(InMemoryTransferQueue::new()),
//!     matching,
//!     Arc::new(InMemoryExecutionStore::new()),
//!     visibility,
//!     manager.config(),
//! )?;
//!
//! processor.start().await?;
//! processor.notify_new_task();
//! processor.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod processor;
pub mod resilience;

pub use config::{ConfigManager, ProcessorConfig, TransferQueueConfig};
pub use error::{Result, TransferError};
pub use models::{TransferTask, TransferTaskInfo, TransferTaskType, WorkflowExecution};
pub use processor::{
    BackoffController, ProcessorMetrics, TaskOutcome, TransferQueueProcessor,
    TransferTaskExecutor, WindowOutcome,
};
