//! # Downstream Clients
//!
//! Interfaces of the services the processor notifies: the matching (task routing)
//! service and the visibility store that records closed executions.

pub mod matching;
pub mod visibility;

pub use matching::{AddActivityTaskRequest, AddDecisionTaskRequest, MatchingClient, TaskList};
pub use visibility::{RecordWorkflowExecutionClosedRequest, VisibilityManager};
