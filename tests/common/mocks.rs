//! Recording mocks for the downstream clients
//!
//! Every call is recorded, including failed ones, so tests can assert on exact call
//! counts under redelivery.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use transfer_queue::clients::{
    AddActivityTaskRequest, AddDecisionTaskRequest, MatchingClient,
    RecordWorkflowExecutionClosedRequest, VisibilityManager,
};
use transfer_queue::{Result, TransferError};

/// Mock matching state for tracking calls
#[derive(Debug, Default, Clone)]
pub struct MockMatchingState {
    pub activity_tasks: Vec<AddActivityTaskRequest>,
    pub decision_tasks: Vec<AddDecisionTaskRequest>,
}

#[derive(Debug, Default)]
pub struct MockMatchingClient {
    state: Mutex<MockMatchingState>,
    /// Transient failures left to inject, shared by both operations
    failures_remaining: AtomicUsize,
    /// Schedule ids that always fail
    failing_schedule_ids: Mutex<HashSet<i64>>,
}

impl MockMatchingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn fail_schedule_id(&self, schedule_id: i64) {
        self.failing_schedule_ids.lock().unwrap().insert(schedule_id);
    }

    pub fn heal_schedule_id(&self, schedule_id: i64) {
        self.failing_schedule_ids.lock().unwrap().remove(&schedule_id);
    }

    pub fn state(&self) -> MockMatchingState {
        self.state.lock().unwrap().clone()
    }

    pub fn activity_tasks(&self) -> Vec<AddActivityTaskRequest> {
        self.state.lock().unwrap().activity_tasks.clone()
    }

    pub fn decision_tasks(&self) -> Vec<AddDecisionTaskRequest> {
        self.state.lock().unwrap().decision_tasks.clone()
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.activity_tasks.len() + state.decision_tasks.len()
    }

    fn outcome(&self, operation: &str, schedule_id: i64) -> Result<()> {
        let transient = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient || self.failing_schedule_ids.lock().unwrap().contains(&schedule_id) {
            return Err(TransferError::dispatch(operation, "matching service unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchingClient for MockMatchingClient {
    async fn add_activity_task(&self, request: AddActivityTaskRequest) -> Result<()> {
        let schedule_id = request.schedule_id;
        self.state.lock().unwrap().activity_tasks.push(request);
        self.outcome("add_activity_task", schedule_id)
    }

    async fn add_decision_task(&self, request: AddDecisionTaskRequest) -> Result<()> {
        let schedule_id = request.schedule_id;
        self.state.lock().unwrap().decision_tasks.push(request);
        self.outcome("add_decision_task", schedule_id)
    }
}

/// Matching client whose calls never complete
#[derive(Debug, Default)]
pub struct HangingMatchingClient {
    calls: AtomicUsize,
}

impl HangingMatchingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchingClient for HangingMatchingClient {
    async fn add_activity_task(&self, _request: AddActivityTaskRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<()>>().await
    }

    async fn add_decision_task(&self, _request: AddDecisionTaskRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<()>>().await
    }
}

/// Matching client that blocks its thread without yielding to the runtime
#[derive(Debug)]
pub struct BlockingMatchingClient {
    block_for: Duration,
    calls: AtomicUsize,
}

impl BlockingMatchingClient {
    pub fn new(block_for: Duration) -> Self {
        Self {
            block_for,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn block(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.block_for);
        Ok(())
    }
}

#[async_trait]
impl MatchingClient for BlockingMatchingClient {
    async fn add_activity_task(&self, _request: AddActivityTaskRequest) -> Result<()> {
        self.block()
    }

    async fn add_decision_task(&self, _request: AddDecisionTaskRequest) -> Result<()> {
        self.block()
    }
}

#[derive(Debug, Default)]
pub struct MockVisibilityManager {
    closed: Mutex<Vec<RecordWorkflowExecutionClosedRequest>>,
    failures_remaining: AtomicUsize,
}

impl MockVisibilityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn closed_executions(&self) -> Vec<RecordWorkflowExecutionClosedRequest> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisibilityManager for MockVisibilityManager {
    async fn record_workflow_execution_closed(
        &self,
        request: RecordWorkflowExecutionClosedRequest,
    ) -> Result<()> {
        self.closed.lock().unwrap().push(request);
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransferError::visibility("visibility store unavailable"));
        }
        Ok(())
    }
}
