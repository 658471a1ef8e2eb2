//! # In-Memory Persistence
//!
//! Process-local implementations of the persistence collaborators. They honor the same
//! contracts as a durable backend (ordered paging, run-scoped deletes, monotonic ack
//! level) and support failure injection so callers can exercise retry paths.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

use super::{
    ExecutionStore, ReadTransferTasksRequest, ReadTransferTasksResponse, ShardContext,
    TransferQueueStore,
};
use crate::constants::cursor;
use crate::error::{Result, TransferError};
use crate::models::{CloseStatus, TransferTaskInfo, WorkflowExecutionInfo};

/// Consume one unit of an injected failure budget
fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

fn encode_page_token(last_task_id: i64) -> Vec<u8> {
    last_task_id.to_be_bytes().to_vec()
}

fn decode_page_token(token: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = token.try_into().map_err(|_| {
        TransferError::queue_store("read_transfer_tasks", "malformed page token")
    })?;
    Ok(i64::from_be_bytes(bytes))
}

/// Transfer queue held in memory, one ordered map per shard
#[derive(Debug)]
pub struct InMemoryTransferQueue {
    shards: DashMap<i32, BTreeMap<i64, TransferTaskInfo>>,
    next_task_id: AtomicI64,
    read_calls: AtomicU64,
    failing_reads: AtomicUsize,
}

impl Default for InMemoryTransferQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransferQueue {
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            next_task_id: AtomicI64::new(cursor::INITIAL_ACK_LEVEL + 1),
            read_calls: AtomicU64::new(0),
            failing_reads: AtomicUsize::new(0),
        }
    }

    /// Append a task, assigning the next task id. Returns the assigned id.
    pub fn append(&self, shard_id: i32, mut task: TransferTaskInfo) -> i64 {
        let task_id = self.next_task_id.fetch_add(1, Ordering::AcqRel);
        task.task_id = task_id;
        self.shards.entry(shard_id).or_default().insert(task_id, task);
        task_id
    }

    /// Number of tasks held for a shard
    pub fn len(&self, shard_id: i32) -> usize {
        self.shards.get(&shard_id).map_or(0, |tasks| tasks.len())
    }

    pub fn is_empty(&self, shard_id: i32) -> bool {
        self.len(shard_id) == 0
    }

    /// Drop every task of a shard
    pub fn clear(&self, shard_id: i32) {
        self.shards.remove(&shard_id);
    }

    /// Number of page reads served so far
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Acquire)
    }

    /// Make the next `count` reads fail with a queue store error
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::Release);
    }
}

#[async_trait]
impl TransferQueueStore for InMemoryTransferQueue {
    async fn read_transfer_tasks(
        &self,
        request: ReadTransferTasksRequest,
    ) -> Result<ReadTransferTasksResponse> {
        self.read_calls.fetch_add(1, Ordering::AcqRel);

        if take_failure(&self.failing_reads) {
            return Err(TransferError::queue_store(
                "read_transfer_tasks",
                "injected read failure",
            ));
        }

        let lower = match request.next_page_token.as_deref() {
            Some(token) => decode_page_token(token)?,
            None => request.read_level,
        };
        if lower >= request.max_read_level {
            return Ok(ReadTransferTasksResponse::default());
        }

        let Some(shard) = self.shards.get(&request.shard_id) else {
            return Ok(ReadTransferTasksResponse::default());
        };

        let mut range = shard.range(lower + 1..=request.max_read_level);
        let tasks: Vec<TransferTaskInfo> = range
            .by_ref()
            .take(request.batch_size)
            .map(|(_, task)| task.clone())
            .collect();
        let has_more = range.next().is_some();

        let next_page_token = match tasks.last() {
            Some(last) if has_more => Some(encode_page_token(last.task_id)),
            _ => None,
        };

        debug!(
            shard_id = request.shard_id,
            lower,
            max_read_level = request.max_read_level,
            returned = tasks.len(),
            has_more,
            "Served transfer task page"
        );

        Ok(ReadTransferTasksResponse {
            tasks,
            next_page_token,
        })
    }
}

type ExecutionKey = (String, String, String);
type WorkflowKey = (String, String);

/// Execution store held in memory
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: DashMap<ExecutionKey, WorkflowExecutionInfo>,
    current_runs: DashMap<WorkflowKey, String>,
    delete_calls: AtomicU64,
    failing_gets: AtomicUsize,
    failing_deletes: AtomicUsize,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run. Fails while another run of the same workflow id is still open.
    ///
    /// The current-run entry stays locked from the open-run check until the new run is
    /// stored, so concurrent starts of one workflow id admit exactly one run.
    pub fn create_workflow_execution(&self, info: WorkflowExecutionInfo) -> Result<()> {
        let workflow_key = (info.domain_id.clone(), info.workflow_id.clone());
        let key = (
            info.domain_id.clone(),
            info.workflow_id.clone(),
            info.run_id.clone(),
        );
        let run_id = info.run_id.clone();

        match self.current_runs.entry(workflow_key) {
            Entry::Occupied(mut current) => {
                let current_key = (
                    info.domain_id.clone(),
                    info.workflow_id.clone(),
                    current.get().clone(),
                );
                let still_open = self
                    .executions
                    .get(&current_key)
                    .is_some_and(|existing| !existing.is_closed());
                if still_open {
                    return Err(TransferError::ExecutionAlreadyStarted {
                        workflow_id: info.workflow_id,
                        current_run_id: current.get().clone(),
                    });
                }
                self.executions.insert(key, info);
                current.insert(run_id);
            }
            Entry::Vacant(slot) => {
                self.executions.insert(key, info);
                slot.insert(run_id);
            }
        }
        Ok(())
    }

    /// Close a run in place
    pub fn close_workflow_execution(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
        status: CloseStatus,
    ) -> Result<()> {
        let key = (
            domain_id.to_string(),
            workflow_id.to_string(),
            run_id.to_string(),
        );
        let mut info = self
            .executions
            .get_mut(&key)
            .ok_or_else(|| TransferError::execution_not_found(domain_id, workflow_id, run_id))?;
        info.close(status);
        Ok(())
    }

    /// Run id the workflow id currently resolves to
    pub fn current_run_id(&self, domain_id: &str, workflow_id: &str) -> Option<String> {
        self.current_runs
            .get(&(domain_id.to_string(), workflow_id.to_string()))
            .map(|r| r.clone())
    }

    pub fn contains(&self, domain_id: &str, workflow_id: &str, run_id: &str) -> bool {
        self.executions.contains_key(&(
            domain_id.to_string(),
            workflow_id.to_string(),
            run_id.to_string(),
        ))
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::Acquire)
    }

    /// Make the next `count` loads fail with a transient store error
    pub fn fail_next_gets(&self, count: usize) {
        self.failing_gets.store(count, Ordering::Release);
    }

    /// Make the next `count` deletes fail with a transient store error
    pub fn fail_next_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::Release);
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get_workflow_execution(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<WorkflowExecutionInfo> {
        if take_failure(&self.failing_gets) {
            return Err(TransferError::execution_store(
                "get_workflow_execution",
                "injected load failure",
            ));
        }

        self.executions
            .get(&(
                domain_id.to_string(),
                workflow_id.to_string(),
                run_id.to_string(),
            ))
            .map(|info| info.clone())
            .ok_or_else(|| TransferError::execution_not_found(domain_id, workflow_id, run_id))
    }

    async fn delete_workflow_execution(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::AcqRel);

        if take_failure(&self.failing_deletes) {
            return Err(TransferError::execution_store(
                "delete_workflow_execution",
                "injected delete failure",
            ));
        }

        let key = (
            domain_id.to_string(),
            workflow_id.to_string(),
            run_id.to_string(),
        );
        if self.executions.remove(&key).is_none() {
            return Err(TransferError::execution_not_found(
                domain_id,
                workflow_id,
                run_id,
            ));
        }

        self.current_runs.remove_if(
            &(domain_id.to_string(), workflow_id.to_string()),
            |_, current| current == run_id,
        );

        debug!(domain_id, workflow_id, run_id, "Deleted workflow execution");
        Ok(())
    }
}

/// Shard context held in memory
#[derive(Debug)]
pub struct InMemoryShard {
    shard_id: i32,
    ack_level: RwLock<i64>,
    max_read_level: AtomicI64,
    ack_updates: AtomicU64,
    failing_updates: AtomicUsize,
}

impl InMemoryShard {
    /// Fresh shard with the initial ack level and an unbounded max read level
    pub fn new(shard_id: i32) -> Self {
        Self::with_ack_level(shard_id, cursor::INITIAL_ACK_LEVEL)
    }

    /// Shard whose ack level was persisted by a previous owner
    pub fn with_ack_level(shard_id: i32, ack_level: i64) -> Self {
        Self {
            shard_id,
            ack_level: RwLock::new(ack_level),
            max_read_level: AtomicI64::new(cursor::UNBOUNDED_READ_LEVEL),
            ack_updates: AtomicU64::new(0),
            failing_updates: AtomicUsize::new(0),
        }
    }

    pub fn set_max_read_level(&self, level: i64) {
        self.max_read_level.store(level, Ordering::Release);
    }

    /// Currently persisted ack level
    pub fn persisted_ack_level(&self) -> i64 {
        *self.ack_level.read()
    }

    /// Number of successful ack level persists
    pub fn ack_updates(&self) -> u64 {
        self.ack_updates.load(Ordering::Acquire)
    }

    /// Make the next `count` ack level persists fail
    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::Release);
    }
}

#[async_trait]
impl ShardContext for InMemoryShard {
    fn shard_id(&self) -> i32 {
        self.shard_id
    }

    async fn transfer_ack_level(&self) -> Result<i64> {
        Ok(*self.ack_level.read())
    }

    async fn update_transfer_ack_level(&self, ack_level: i64) -> Result<()> {
        if take_failure(&self.failing_updates) {
            return Err(TransferError::queue_store(
                "update_transfer_ack_level",
                "injected persist failure",
            ));
        }

        let mut current = self.ack_level.write();
        if ack_level < *current {
            return Err(TransferError::cursor_invariant(format!(
                "ack level {ack_level} is below persisted ack level {}",
                *current
            )));
        }
        *current = ack_level;
        self.ack_updates.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn transfer_max_read_level(&self) -> Result<i64> {
        Ok(self.max_read_level.load(Ordering::Acquire))
    }
}
