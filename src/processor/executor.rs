//! # Transfer Task Executor
//!
//! Classifies each scanned record into a [`TransferTask`] and performs its action:
//!
//! - **ActivityTask / DecisionTask**: add the task to the matching service, keyed by
//!   `(execution, schedule_id)`; redelivery is expected and safe
//! - **CloseExecution**: record the closed run in visibility
//! - **DeleteExecution**: delete exactly the run the task names
//!
//! A target execution that no longer exists is a success: the outcome the task asked
//! for already holds. Unknown task types fail and keep the cursor behind them.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clients::{
    AddActivityTaskRequest, AddDecisionTaskRequest, MatchingClient,
    RecordWorkflowExecutionClosedRequest, VisibilityManager,
};
use crate::config::TransferQueueConfig;
use crate::constants::components;
use crate::error::Result;
use crate::logging::{log_error, log_task_operation};
use crate::models::{
    DispatchTarget, ExecutionTarget, TransferTask, TransferTaskInfo, WorkflowExecutionInfo,
};
use crate::persistence::ExecutionStore;
use crate::resilience::{CircuitBreaker, RetryPolicy};

use super::metrics::ProcessorMetrics;

/// What processing a task amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The downstream action was performed
    Dispatched,
    /// Target execution was already gone; nothing left to do
    AlreadyResolved,
}

pub struct TransferTaskExecutor {
    shard_id: i32,
    matching: Arc<dyn MatchingClient>,
    executions: Arc<dyn ExecutionStore>,
    visibility: Arc<dyn VisibilityManager>,
    retry_policy: RetryPolicy,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    metrics: Arc<ProcessorMetrics>,
}

impl std::fmt::Debug for TransferTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTaskExecutor")
            .field("shard_id", &self.shard_id)
            .field("retry_policy", &self.retry_policy)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish()
    }
}

impl TransferTaskExecutor {
    /// Executor without retries or circuit breaker
    pub fn new(
        shard_id: i32,
        matching: Arc<dyn MatchingClient>,
        executions: Arc<dyn ExecutionStore>,
        visibility: Arc<dyn VisibilityManager>,
    ) -> Self {
        Self {
            shard_id,
            matching,
            executions,
            visibility,
            retry_policy: RetryPolicy::no_retry(),
            circuit_breaker: None,
            metrics: Arc::new(ProcessorMetrics::new()),
        }
    }

    /// Executor with retry and circuit breaker settings taken from `config`
    pub fn from_config(
        shard_id: i32,
        matching: Arc<dyn MatchingClient>,
        executions: Arc<dyn ExecutionStore>,
        visibility: Arc<dyn VisibilityManager>,
        config: &TransferQueueConfig,
    ) -> Self {
        let executor = Self::new(shard_id, matching, executions, visibility)
            .with_retry_policy(RetryPolicy::from(&config.dispatch_retry));

        if config.circuit_breaker.enabled {
            executor.with_circuit_breaker(Arc::new(CircuitBreaker::new(
                format!("{}_shard_{shard_id}", components::MATCHING),
                config.circuit_breaker.to_breaker_config(),
            )))
        } else {
            executor
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    pub fn shard_id(&self) -> i32 {
        self.shard_id
    }

    pub fn metrics(&self) -> Arc<ProcessorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.circuit_breaker.as_ref()
    }

    /// Process one record, recording the outcome in metrics and logs
    pub async fn execute(&self, info: &TransferTaskInfo) -> Result<TaskOutcome> {
        let result = self.process(info).await;

        match &result {
            Ok(TaskOutcome::Dispatched) => {
                self.metrics.record_dispatched();
                log_task_operation("process_transfer_task", self.shard_id, info, "dispatched", None);
            }
            Ok(TaskOutcome::AlreadyResolved) => {
                self.metrics.record_skipped();
                log_task_operation(
                    "process_transfer_task",
                    self.shard_id,
                    info,
                    "already_resolved",
                    Some("target execution no longer exists"),
                );
            }
            Err(err) => {
                self.metrics.record_failed(err);
                log_error(
                    "transfer_task_executor",
                    "process_transfer_task",
                    &err.to_string(),
                    Some(&format!(
                        "shard_id={} task_id={} workflow_id={} run_id={}",
                        self.shard_id, info.task_id, info.workflow_id, info.run_id
                    )),
                );
            }
        }

        result
    }

    async fn process(&self, info: &TransferTaskInfo) -> Result<TaskOutcome> {
        match TransferTask::try_from(info)? {
            TransferTask::ActivityTask(target) => self.process_activity_task(&target).await,
            TransferTask::DecisionTask(target) => self.process_decision_task(&target).await,
            TransferTask::CloseExecution(target) => self.process_close_execution(&target).await,
            TransferTask::DeleteExecution(target) => self.process_delete_execution(&target).await,
        }
    }

    async fn process_activity_task(&self, target: &DispatchTarget) -> Result<TaskOutcome> {
        let request = AddActivityTaskRequest::from(target);
        debug!(
            shard_id = self.shard_id,
            execution = %request.execution,
            task_list = %request.task_list.name,
            schedule_id = request.schedule_id,
            "Adding activity task"
        );

        self.retry_policy
            .retry("add_activity_task", move || {
                let request = request.clone();
                async move { self.guarded(self.matching.add_activity_task(request)).await }
            })
            .await?;

        Ok(TaskOutcome::Dispatched)
    }

    async fn process_decision_task(&self, target: &DispatchTarget) -> Result<TaskOutcome> {
        let request = AddDecisionTaskRequest::from(target);
        debug!(
            shard_id = self.shard_id,
            execution = %request.execution,
            task_list = %request.task_list.name,
            schedule_id = request.schedule_id,
            "Adding decision task"
        );

        self.retry_policy
            .retry("add_decision_task", move || {
                let request = request.clone();
                async move { self.guarded(self.matching.add_decision_task(request)).await }
            })
            .await?;

        Ok(TaskOutcome::Dispatched)
    }

    async fn process_close_execution(&self, target: &ExecutionTarget) -> Result<TaskOutcome> {
        let Some(info) = self.load_execution(target).await? else {
            return Ok(TaskOutcome::AlreadyResolved);
        };

        let close_status = match info.close_status {
            Some(status) if info.is_closed() => status,
            _ => {
                warn!(
                    shard_id = self.shard_id,
                    execution = %target.execution,
                    state = ?info.state,
                    "Close task for a run that is not closed, skipping"
                );
                return Ok(TaskOutcome::AlreadyResolved);
            }
        };

        let request = RecordWorkflowExecutionClosedRequest {
            domain_id: target.domain_id.clone(),
            execution: target.execution.clone(),
            workflow_type: info.workflow_type.clone(),
            start_timestamp: info.start_timestamp,
            close_timestamp: info.close_timestamp.unwrap_or(info.last_updated_timestamp),
            close_status,
        };

        self.retry_policy
            .retry("record_workflow_execution_closed", move || {
                let request = request.clone();
                async move {
                    self.visibility
                        .record_workflow_execution_closed(request)
                        .await
                }
            })
            .await?;

        Ok(TaskOutcome::Dispatched)
    }

    async fn process_delete_execution(&self, target: &ExecutionTarget) -> Result<TaskOutcome> {
        if self.load_execution(target).await?.is_none() {
            return Ok(TaskOutcome::AlreadyResolved);
        }

        let execution = &target.execution;
        let deleted = self
            .retry_policy
            .retry("delete_workflow_execution", || {
                self.executions.delete_workflow_execution(
                    &target.domain_id,
                    &execution.workflow_id,
                    &execution.run_id,
                )
            })
            .await;

        match deleted {
            Ok(()) => Ok(TaskOutcome::Dispatched),
            Err(err) if err.is_not_found() => Ok(TaskOutcome::AlreadyResolved),
            Err(err) => Err(err),
        }
    }

    /// Load the targeted run; `None` when it no longer exists
    async fn load_execution(&self, target: &ExecutionTarget) -> Result<Option<WorkflowExecutionInfo>> {
        let execution = &target.execution;
        let loaded = self
            .retry_policy
            .retry("get_workflow_execution", || {
                self.executions.get_workflow_execution(
                    &target.domain_id,
                    &execution.workflow_id,
                    &execution.run_id,
                )
            })
            .await;

        match loaded {
            Ok(info) => Ok(Some(info)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn guarded<T, Fut>(&self, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match &self.circuit_breaker {
            Some(breaker) => breaker.call(|| call).await,
            None => call.await,
        }
    }
}
