//! Visibility store client used to record that an execution has closed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CloseStatus, WorkflowExecution};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordWorkflowExecutionClosedRequest {
    pub domain_id: String,
    pub execution: WorkflowExecution,
    pub workflow_type: String,
    pub start_timestamp: DateTime<Utc>,
    pub close_timestamp: DateTime<Utc>,
    pub close_status: CloseStatus,
}

/// Re-recording an already closed execution must be a no-op downstream.
#[async_trait]
pub trait VisibilityManager: Send + Sync {
    async fn record_workflow_execution_closed(
        &self,
        request: RecordWorkflowExecutionClosedRequest,
    ) -> Result<()>;
}
