//! Shared fixtures for transfer queue integration tests
//!
//! [`TestHarness`] wires in-memory persistence and recording mocks around a processor
//! so tests can enqueue tasks, run windows, restart processors and inspect every
//! downstream call.

#![allow(dead_code)]

pub mod mocks;
pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use transfer_queue::clients::MatchingClient;
use transfer_queue::config::{
    CircuitBreakerSettings, LoggingConfig, ProcessorConfig, RetryConfig, TransferQueueConfig,
};
use transfer_queue::constants::task_types;
use transfer_queue::models::{TransferTaskInfo, WorkflowExecution, WorkflowExecutionInfo};
use transfer_queue::persistence::{InMemoryExecutionStore, InMemoryShard, InMemoryTransferQueue};
use transfer_queue::TransferQueueProcessor;

pub use mocks::{
    BlockingMatchingClient, HangingMatchingClient, MockMatchingClient, MockVisibilityManager,
};

pub const SHARD_ID: i32 = 1;
pub const DOMAIN_ID: &str = "deadbeef-0000-4567-890a-bcdef0123456";
pub const MIN_POLL: Duration = Duration::from_millis(5);
pub const MAX_POLL: Duration = Duration::from_millis(100);

/// Fast polling, no in-place retries, no circuit breaker
pub fn test_config() -> TransferQueueConfig {
    TransferQueueConfig {
        processor: ProcessorConfig {
            min_poll_interval_ms: MIN_POLL.as_millis() as u64,
            max_poll_interval_ms: MAX_POLL.as_millis() as u64,
            batch_size: 3,
            worker_count: 4,
            channel_capacity: 2,
            stop_timeout_ms: 1_000,
        },
        dispatch_retry: RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        },
        circuit_breaker: CircuitBreakerSettings {
            enabled: false,
            ..CircuitBreakerSettings::default()
        },
        logging: LoggingConfig::default(),
    }
}

pub struct TestHarness {
    pub shard: Arc<InMemoryShard>,
    pub queue: Arc<InMemoryTransferQueue>,
    pub executions: Arc<InMemoryExecutionStore>,
    pub matching: Arc<MockMatchingClient>,
    pub visibility: Arc<MockVisibilityManager>,
    pub config: TransferQueueConfig,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: TransferQueueConfig) -> Self {
        Self {
            shard: Arc::new(InMemoryShard::new(SHARD_ID)),
            queue: Arc::new(InMemoryTransferQueue::new()),
            executions: Arc::new(InMemoryExecutionStore::new()),
            matching: Arc::new(MockMatchingClient::new()),
            visibility: Arc::new(MockVisibilityManager::new()),
            config,
        }
    }

    /// A fresh processor over the harness collaborators; call again to simulate a
    /// new shard owner after a crash
    pub fn processor(&self) -> TransferQueueProcessor {
        self.processor_with_matching(self.matching.clone())
    }

    /// A processor that dispatches to `matching` instead of the recording mock
    pub fn processor_with_matching(
        &self,
        matching: Arc<dyn MatchingClient>,
    ) -> TransferQueueProcessor {
        TransferQueueProcessor::from_config(
            self.shard.clone(),
            self.queue.clone(),
            matching,
            self.executions.clone(),
            self.visibility.clone(),
            &self.config,
        )
        .expect("test configuration is valid")
    }

    pub fn enqueue(&self, task: TransferTaskInfo) -> i64 {
        self.queue.append(SHARD_ID, task)
    }

    pub fn add_decision_task(
        &self,
        execution: &WorkflowExecution,
        task_list: &str,
        schedule_id: i64,
    ) -> i64 {
        self.enqueue(
            TransferTaskInfo::new(0, task_types::DECISION_TASK, DOMAIN_ID, execution)
                .with_task_list(task_list)
                .with_schedule_id(schedule_id),
        )
    }

    pub fn add_activity_task(
        &self,
        execution: &WorkflowExecution,
        task_list: &str,
        schedule_id: i64,
    ) -> i64 {
        self.enqueue(
            TransferTaskInfo::new(0, task_types::ACTIVITY_TASK, DOMAIN_ID, execution)
                .with_task_list(task_list)
                .with_schedule_id(schedule_id),
        )
    }

    pub fn add_close_execution_task(&self, execution: &WorkflowExecution) -> i64 {
        self.enqueue(TransferTaskInfo::new(
            0,
            task_types::CLOSE_EXECUTION,
            DOMAIN_ID,
            execution,
        ))
    }

    pub fn add_delete_execution_task(&self, execution: &WorkflowExecution) -> i64 {
        self.enqueue(TransferTaskInfo::new(
            0,
            task_types::DELETE_EXECUTION,
            DOMAIN_ID,
            execution,
        ))
    }

    /// Start a run and queue its first decision task, like a workflow start does
    pub fn start_workflow(
        &self,
        execution: &WorkflowExecution,
        task_list: &str,
    ) -> transfer_queue::Result<i64> {
        self.executions.create_workflow_execution(WorkflowExecutionInfo::new(
            DOMAIN_ID, execution, task_list, "wType",
        ))?;
        Ok(self.add_decision_task(execution, task_list, 2))
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
