//! Workflow execution identity and the loaded state the processor needs from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a single run of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for WorkflowExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.run_id)
    }
}

/// Lifecycle state of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    Running,
    Completed,
}

/// How a closed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseStatus {
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Terminated => "terminated",
            Self::ContinuedAsNew => "continued_as_new",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Execution state resolved by the execution loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecutionInfo {
    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,
    pub task_list: String,
    pub workflow_type: String,
    pub state: WorkflowState,
    pub close_status: Option<CloseStatus>,
    pub start_timestamp: DateTime<Utc>,
    pub close_timestamp: Option<DateTime<Utc>>,
    pub last_updated_timestamp: DateTime<Utc>,
    pub next_event_id: i64,
    pub create_request_id: Uuid,
}

impl WorkflowExecutionInfo {
    /// A freshly started run
    pub fn new(
        domain_id: impl Into<String>,
        execution: &WorkflowExecution,
        task_list: impl Into<String>,
        workflow_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            domain_id: domain_id.into(),
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
            task_list: task_list.into(),
            workflow_type: workflow_type.into(),
            state: WorkflowState::Running,
            close_status: None,
            start_timestamp: now,
            close_timestamp: None,
            last_updated_timestamp: now,
            next_event_id: 2,
            create_request_id: Uuid::new_v4(),
        }
    }

    pub fn execution(&self) -> WorkflowExecution {
        WorkflowExecution::new(self.workflow_id.clone(), self.run_id.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.state == WorkflowState::Completed
    }

    /// Mark the run closed with the given status
    pub fn close(&mut self, status: CloseStatus) {
        let now = Utc::now();
        self.state = WorkflowState::Completed;
        self.close_status = Some(status);
        self.close_timestamp = Some(now);
        self.last_updated_timestamp = now;
    }
}
