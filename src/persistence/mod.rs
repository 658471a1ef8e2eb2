//! # Persistence Collaborators
//!
//! Interfaces the transfer queue processor consumes but does not own: the append-only
//! transfer queue, the workflow execution store, and the shard context that holds the
//! persisted cursor. In-memory implementations live in [`memory`].

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{TransferTaskInfo, WorkflowExecutionInfo};

pub use memory::{InMemoryExecutionStore, InMemoryShard, InMemoryTransferQueue};

/// One page request against the transfer queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTransferTasksRequest {
    pub shard_id: i32,
    /// Exclusive lower bound
    pub read_level: i64,
    /// Inclusive upper bound
    pub max_read_level: i64,
    pub batch_size: usize,
    pub next_page_token: Option<Vec<u8>>,
}

/// One page of transfer tasks, ordered by `task_id`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadTransferTasksResponse {
    pub tasks: Vec<TransferTaskInfo>,
    /// `None` once the requested range is exhausted
    pub next_page_token: Option<Vec<u8>>,
}

/// Append-only persisted queue of transfer tasks
#[async_trait]
pub trait TransferQueueStore: Send + Sync {
    /// Read one page of tasks with `read_level < task_id <= max_read_level`
    async fn read_transfer_tasks(
        &self,
        request: ReadTransferTasksRequest,
    ) -> Result<ReadTransferTasksResponse>;
}

/// Workflow execution store and loader
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Load a specific run. `TransferError::ExecutionNotFound` when it does not exist.
    async fn get_workflow_execution(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<WorkflowExecutionInfo>;

    /// Delete the mutable state of exactly this run.
    ///
    /// Must not touch any other run of the same workflow id, and must clear the
    /// current-run pointer only when it still points at `run_id`.
    async fn delete_workflow_execution(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<()>;
}

/// Shard ownership context: source and sink of the transfer cursor
#[async_trait]
pub trait ShardContext: Send + Sync {
    fn shard_id(&self) -> i32;

    /// Persisted ack level loaded when the processor starts
    async fn transfer_ack_level(&self) -> Result<i64>;

    /// Persist a new ack level
    async fn update_transfer_ack_level(&self, ack_level: i64) -> Result<()>;

    /// Highest task id the write path has made visible so far
    async fn transfer_max_read_level(&self) -> Result<i64>;
}
