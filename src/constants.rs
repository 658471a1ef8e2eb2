//! # System Constants
//!
//! Default operating bounds of the transfer queue processor and the persisted codes
//! shared with the write path that appends transfer tasks.

/// Persisted `task_type` codes for transfer task records
pub mod task_types {
    pub const ACTIVITY_TASK: i32 = 0;
    pub const DECISION_TASK: i32 = 1;
    pub const DELETE_EXECUTION: i32 = 2;
    pub const CLOSE_EXECUTION: i32 = 3;
}

/// Processor defaults
pub mod defaults {
    /// Page size of a single store read
    pub const TRANSFER_TASK_BATCH_SIZE: usize = 10;
    pub const MIN_POLL_INTERVAL_MS: u64 = 10;
    pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;
    pub const WORKER_COUNT: usize = 10;
    pub const CHANNEL_CAPACITY: usize = 10;
    pub const STOP_TIMEOUT_MS: u64 = 5_000;

    pub const RETRY_MAX_ATTEMPTS: u32 = 3;
    pub const RETRY_INITIAL_INTERVAL_MS: u64 = 50;
    pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const RETRY_MAX_INTERVAL_MS: u64 = 1_000;

    pub const CIRCUIT_FAILURE_THRESHOLD: usize = 5;
    pub const CIRCUIT_TIMEOUT_SECONDS: u64 = 30;
    pub const CIRCUIT_SUCCESS_THRESHOLD: usize = 2;
}

/// Cursor sentinels
pub mod cursor {
    /// Ack level of a shard that has never acknowledged a transfer task
    pub const INITIAL_ACK_LEVEL: i64 = 0;
    /// Lets the reader see every appended task
    pub const UNBOUNDED_READ_LEVEL: i64 = i64::MAX;
}

/// Environment detection
pub mod environment {
    pub const ENV_VAR: &str = "TRANSFER_QUEUE_ENV";
    pub const FALLBACK_ENV_VAR: &str = "APP_ENV";
    pub const DEFAULT: &str = "development";
    pub const CONFIG_ENV_PREFIX: &str = "TRANSFER_QUEUE";
    pub const CONFIG_FILE_STEM: &str = "transfer-queue";
}

/// Component names used in logs and circuit breakers
pub mod components {
    pub const MATCHING: &str = "matching";
}
