//! # Transfer Queue Error Types
//!
//! Structured error handling for the transfer queue processor using thiserror.
//! Every collaborator failure is folded into [`TransferError`] so the processor loop
//! can classify it (retry, skip as already-resolved, or block the cursor).

use thiserror::Error;

/// Errors surfaced by the transfer queue processor and its collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("Queue store error: {operation}: {message}")]
    QueueStore { operation: String, message: String },

    #[error("Execution store error: {operation}: {message}")]
    ExecutionStore { operation: String, message: String },

    #[error("Workflow execution not found: domain={domain_id} workflow_id={workflow_id} run_id={run_id}")]
    ExecutionNotFound {
        domain_id: String,
        workflow_id: String,
        run_id: String,
    },

    #[error("Workflow execution already started: workflow_id={workflow_id} current_run_id={current_run_id}")]
    ExecutionAlreadyStarted {
        workflow_id: String,
        current_run_id: String,
    },

    #[error("Dispatch failed: {operation}: {message}")]
    Dispatch { operation: String, message: String },

    #[error("Visibility error: {message}")]
    Visibility { message: String },

    #[error("Unknown transfer task type {task_type} for task {task_id}")]
    UnknownTaskType { task_id: i64, task_type: i32 },

    #[error("Cursor invariant violated: {message}")]
    CursorInvariant { message: String },

    #[error("Circuit breaker is open for component: {component}")]
    CircuitOpen { component: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl TransferError {
    /// Create a queue store error
    pub fn queue_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueStore {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an execution store error
    pub fn execution_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionStore {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an execution-not-found error
    pub fn execution_not_found(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self::ExecutionNotFound {
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }

    /// Create a dispatch error
    pub fn dispatch(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a visibility error
    pub fn visibility(message: impl Into<String>) -> Self {
        Self::Visibility {
            message: message.into(),
        }
    }

    /// Create a cursor invariant violation
    pub fn cursor_invariant(message: impl Into<String>) -> Self {
        Self::CursorInvariant {
            message: message.into(),
        }
    }

    /// Create a circuit-open error
    pub fn circuit_open(component: impl Into<String>) -> Self {
        Self::CircuitOpen {
            component: component.into(),
        }
    }

    /// The target execution no longer exists; the task's goal already holds.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ExecutionNotFound { .. })
    }

    /// Whether re-offering the same work later can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::QueueStore { .. }
            | Self::ExecutionStore { .. }
            | Self::Dispatch { .. }
            | Self::Visibility { .. }
            | Self::CircuitOpen { .. }
            | Self::Timeout(_) => true,
            Self::ExecutionNotFound { .. }
            | Self::ExecutionAlreadyStarted { .. }
            | Self::UnknownTaskType { .. }
            | Self::CursorInvariant { .. }
            | Self::Configuration(_)
            | Self::InvalidState(_) => false,
        }
    }

    /// Short stable label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueueStore { .. } => "queue_store",
            Self::ExecutionStore { .. } => "execution_store",
            Self::ExecutionNotFound { .. } => "execution_not_found",
            Self::ExecutionAlreadyStarted { .. } => "execution_already_started",
            Self::Dispatch { .. } => "dispatch",
            Self::Visibility { .. } => "visibility",
            Self::UnknownTaskType { .. } => "unknown_task_type",
            Self::CursorInvariant { .. } => "cursor_invariant",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Configuration(_) => "configuration",
            Self::InvalidState(_) => "invalid_state",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl From<config::ConfigError> for TransferError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
