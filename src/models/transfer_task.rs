//! Transfer Task Records
//!
//! A transfer task is the durable record that "something must be dispatched or cleaned up"
//! for a workflow execution. The store hands back [`TransferTaskInfo`] exactly as it was
//! persisted; the processor converts it into the closed [`TransferTask`] variant before
//! acting on it so that every task type has exactly one handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::execution::WorkflowExecution;
use crate::constants::task_types;
use crate::error::{Result, TransferError};

/// Persisted transfer task record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTaskInfo {
    /// Strictly increasing within a shard; the unit of the read/ack cursor
    pub task_id: i64,

    /// Persisted task type code (see [`crate::constants::task_types`])
    pub task_type: i32,

    pub domain_id: String,
    pub workflow_id: String,
    pub run_id: String,

    /// Downstream task list the task is routed to
    pub task_list: String,

    /// Scheduled event id; idempotency key for dispatch
    pub schedule_id: i64,

    /// Only meaningful for task types with delayed visibility
    pub visibility_timestamp: Option<DateTime<Utc>>,
}

impl TransferTaskInfo {
    /// Create a record with the given identity and type code
    pub fn new(
        task_id: i64,
        task_type: i32,
        domain_id: impl Into<String>,
        execution: &WorkflowExecution,
    ) -> Self {
        Self {
            task_id,
            task_type,
            domain_id: domain_id.into(),
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
            task_list: String::new(),
            schedule_id: 0,
            visibility_timestamp: None,
        }
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = task_list.into();
        self
    }

    pub fn with_schedule_id(mut self, schedule_id: i64) -> Self {
        self.schedule_id = schedule_id;
        self
    }

    /// The workflow execution this task targets
    pub fn execution(&self) -> WorkflowExecution {
        WorkflowExecution::new(self.workflow_id.clone(), self.run_id.clone())
    }
}

/// Closed set of transfer task kinds the processor knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferTaskType {
    ActivityTask,
    DecisionTask,
    CloseExecution,
    DeleteExecution,
}

impl TransferTaskType {
    /// Persisted code for this task type
    pub fn code(self) -> i32 {
        match self {
            Self::ActivityTask => task_types::ACTIVITY_TASK,
            Self::DecisionTask => task_types::DECISION_TASK,
            Self::CloseExecution => task_types::CLOSE_EXECUTION,
            Self::DeleteExecution => task_types::DELETE_EXECUTION,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            task_types::ACTIVITY_TASK => Some(Self::ActivityTask),
            task_types::DECISION_TASK => Some(Self::DecisionTask),
            task_types::CLOSE_EXECUTION => Some(Self::CloseExecution),
            task_types::DELETE_EXECUTION => Some(Self::DeleteExecution),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ActivityTask => "activity_task",
            Self::DecisionTask => "decision_task",
            Self::CloseExecution => "close_execution",
            Self::DeleteExecution => "delete_execution",
        }
    }
}

impl fmt::Display for TransferTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing data carried by activity and decision tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    pub domain_id: String,
    pub execution: WorkflowExecution,
    pub task_list: String,
    pub schedule_id: i64,
}

/// Identity of the execution a close or delete task acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTarget {
    pub domain_id: String,
    pub execution: WorkflowExecution,
}

/// A transfer task classified by type, carrying only what its handler needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferTask {
    ActivityTask(DispatchTarget),
    DecisionTask(DispatchTarget),
    CloseExecution(ExecutionTarget),
    DeleteExecution(ExecutionTarget),
}

impl TransferTask {
    pub fn task_type(&self) -> TransferTaskType {
        match self {
            Self::ActivityTask(_) => TransferTaskType::ActivityTask,
            Self::DecisionTask(_) => TransferTaskType::DecisionTask,
            Self::CloseExecution(_) => TransferTaskType::CloseExecution,
            Self::DeleteExecution(_) => TransferTaskType::DeleteExecution,
        }
    }
}

impl TryFrom<&TransferTaskInfo> for TransferTask {
    type Error = TransferError;

    fn try_from(info: &TransferTaskInfo) -> Result<Self> {
        let task_type =
            TransferTaskType::from_code(info.task_type).ok_or(TransferError::UnknownTaskType {
                task_id: info.task_id,
                task_type: info.task_type,
            })?;

        let task = match task_type {
            TransferTaskType::ActivityTask | TransferTaskType::DecisionTask => {
                let target = DispatchTarget {
                    domain_id: info.domain_id.clone(),
                    execution: info.execution(),
                    task_list: info.task_list.clone(),
                    schedule_id: info.schedule_id,
                };
                if task_type == TransferTaskType::ActivityTask {
                    Self::ActivityTask(target)
                } else {
                    Self::DecisionTask(target)
                }
            }
            TransferTaskType::CloseExecution => Self::CloseExecution(ExecutionTarget {
                domain_id: info.domain_id.clone(),
                execution: info.execution(),
            }),
            TransferTaskType::DeleteExecution => Self::DeleteExecution(ExecutionTarget {
                domain_id: info.domain_id.clone(),
                execution: info.execution(),
            }),
        };

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution() -> WorkflowExecution {
        WorkflowExecution::new("wf-1", "run-1")
    }

    #[test]
    fn test_decision_record_classifies_as_decision_task() {
        let info = TransferTaskInfo::new(7, task_types::DECISION_TASK, "domain", &execution())
            .with_task_list("tl")
            .with_schedule_id(2);

        let task = TransferTask::try_from(&info).unwrap();
        assert_eq!(task.task_type(), TransferTaskType::DecisionTask);
        match task {
            TransferTask::DecisionTask(target) => {
                assert_eq!(target.execution, execution());
                assert_eq!(target.task_list, "tl");
                assert_eq!(target.schedule_id, 2);
            }
            other => panic!("unexpected task: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let info = TransferTaskInfo::new(9, 42, "domain", &execution());
        let err = TransferTask::try_from(&info).unwrap_err();
        assert_eq!(
            err,
            TransferError::UnknownTaskType {
                task_id: 9,
                task_type: 42
            }
        );
    }

    #[test]
    fn test_codes_round_trip() {
        for task_type in [
            TransferTaskType::ActivityTask,
            TransferTaskType::DecisionTask,
            TransferTaskType::CloseExecution,
            TransferTaskType::DeleteExecution,
        ] {
            assert_eq!(TransferTaskType::from_code(task_type.code()), Some(task_type));
        }
    }
}
