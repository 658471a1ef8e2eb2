//! Matching service client
//!
//! The matching service routes activity and decision tasks to pollers. Adds are keyed by
//! `(execution, schedule_id)`: implementations must accept the same add more than once,
//! since the processor redelivers after a crash before its ack is persisted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{DispatchTarget, WorkflowExecution};

/// Named downstream queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
}

impl TaskList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddActivityTaskRequest {
    pub domain_id: String,
    pub execution: WorkflowExecution,
    pub task_list: TaskList,
    pub schedule_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDecisionTaskRequest {
    pub domain_id: String,
    pub execution: WorkflowExecution,
    pub task_list: TaskList,
    pub schedule_id: i64,
}

impl From<&DispatchTarget> for AddActivityTaskRequest {
    fn from(target: &DispatchTarget) -> Self {
        Self {
            domain_id: target.domain_id.clone(),
            execution: target.execution.clone(),
            task_list: TaskList::new(target.task_list.clone()),
            schedule_id: target.schedule_id,
        }
    }
}

impl From<&DispatchTarget> for AddDecisionTaskRequest {
    fn from(target: &DispatchTarget) -> Self {
        Self {
            domain_id: target.domain_id.clone(),
            execution: target.execution.clone(),
            task_list: TaskList::new(target.task_list.clone()),
            schedule_id: target.schedule_id,
        }
    }
}

/// Client for the task routing service
#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn add_activity_task(&self, request: AddActivityTaskRequest) -> Result<()>;

    async fn add_decision_task(&self, request: AddDecisionTaskRequest) -> Result<()>;
}
