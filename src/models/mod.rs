pub mod execution;
pub mod transfer_task;

// Re-export models for easy access
pub use execution::{CloseStatus, WorkflowExecution, WorkflowExecutionInfo, WorkflowState};
pub use transfer_task::{
    DispatchTarget, ExecutionTarget, TransferTask, TransferTaskInfo, TransferTaskType,
};
