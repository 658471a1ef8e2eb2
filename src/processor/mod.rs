//! # Transfer Queue Processing
//!
//! The components that move transfer tasks from the persisted queue to the services
//! that act on them:
//!
//! - [`BackoffController`]: poll interval policy (pure)
//! - [`QueueReader`]: paged scan of one window into a bounded channel
//! - [`TransferTaskExecutor`]: per-type dispatch of one task
//! - [`AckManager`]: contiguous-prefix acknowledgement of a window's tasks
//! - [`WindowProcessor`]: one scan + dispatch + ack + backoff cycle
//! - [`TransferQueueProcessor`]: per-shard lifecycle and control loop
//!
//! Delivery is at-least-once. The cursor never moves past a task that has not been
//! processed successfully, so a crash between dispatch and cursor persistence means the
//! task is dispatched again after restart.

pub mod ack_manager;
pub mod backoff;
pub mod executor;
pub mod metrics;
pub mod queue_processor;
pub mod reader;
pub mod window;

pub use ack_manager::AckManager;
pub use backoff::BackoffController;
pub use executor::{TaskOutcome, TransferTaskExecutor};
pub use metrics::{ProcessorMetrics, ProcessorMetricsSnapshot};
pub use queue_processor::TransferQueueProcessor;
pub use reader::{QueueReader, ScanResult};
pub use window::{WindowOutcome, WindowProcessor};
