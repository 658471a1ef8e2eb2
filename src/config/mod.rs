//! # Transfer Queue Configuration
//!
//! Explicit, validated configuration for the transfer queue processor. Nothing in the
//! crate reads configuration globally: a [`TransferQueueConfig`] is built once (usually
//! through [`ConfigManager`]) and handed to the components at construction.
//!
//! ## Layering
//!
//! 1. `config/transfer-queue.yaml` (base, required)
//! 2. `config/transfer-queue.<environment>.yaml` (optional overlay)
//! 3. `TRANSFER_QUEUE__<SECTION>__<KEY>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use transfer_queue::config::ConfigManager;
//!
//! # fn main() -> transfer_queue::Result<()> {
//! let manager = ConfigManager::load()?;
//! let processor = &manager.config().processor;
//! println!("polling between {:?} and {:?}", processor.min_poll_interval(), processor.max_poll_interval());
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::defaults;
use crate::error::{Result, TransferError};
use crate::resilience::CircuitBreakerConfig;

pub use loader::ConfigManager;

/// Root configuration mirroring transfer-queue.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferQueueConfig {
    /// Polling, batching and worker settings
    pub processor: ProcessorConfig,

    /// In-place retries of transient collaborator errors
    pub dispatch_retry: RetryConfig,

    /// Circuit breaker guarding the matching service
    pub circuit_breaker: CircuitBreakerSettings,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub min_poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    /// Page size of one store read
    pub batch_size: usize,
    /// Concurrent dispatch workers per window
    pub worker_count: usize,
    /// Bound of the reader → dispatcher channel
    pub channel_capacity: usize,
    /// How long `stop()` waits for the control loop
    pub stop_timeout_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            min_poll_interval_ms: defaults::MIN_POLL_INTERVAL_MS,
            max_poll_interval_ms: defaults::MAX_POLL_INTERVAL_MS,
            batch_size: defaults::TRANSFER_TASK_BATCH_SIZE,
            worker_count: defaults::WORKER_COUNT,
            channel_capacity: defaults::CHANNEL_CAPACITY,
            stop_timeout_ms: defaults::STOP_TIMEOUT_MS,
        }
    }
}

impl ProcessorConfig {
    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(self.min_poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Reject polling and worker settings the control loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.min_poll_interval_ms == 0 {
            return Err(invalid("processor.min_poll_interval_ms must be greater than 0"));
        }
        if self.min_poll_interval_ms > self.max_poll_interval_ms {
            return Err(invalid(format!(
                "processor.min_poll_interval_ms ({}) exceeds processor.max_poll_interval_ms ({})",
                self.min_poll_interval_ms, self.max_poll_interval_ms
            )));
        }
        if self.batch_size == 0 {
            return Err(invalid("processor.batch_size must be greater than 0"));
        }
        if self.worker_count == 0 {
            return Err(invalid("processor.worker_count must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(invalid("processor.channel_capacity must be greater than 0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            initial_interval_ms: defaults::RETRY_INITIAL_INTERVAL_MS,
            backoff_multiplier: defaults::RETRY_BACKOFF_MULTIPLIER,
            max_interval_ms: defaults::RETRY_MAX_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    pub failure_threshold: usize,
    pub timeout_seconds: u64,
    pub success_threshold: usize,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: defaults::CIRCUIT_FAILURE_THRESHOLD,
            timeout_seconds: defaults::CIRCUIT_TIMEOUT_SECONDS,
            success_threshold: defaults::CIRCUIT_SUCCESS_THRESHOLD,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            timeout: Duration::from_secs(self.timeout_seconds),
            success_threshold: self.success_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TransferQueueConfig {
    /// Reject settings the processor cannot run with
    pub fn validate(&self) -> Result<()> {
        self.processor.validate()?;

        let retry = &self.dispatch_retry;
        if retry.max_attempts == 0 {
            return Err(invalid("dispatch_retry.max_attempts must be at least 1"));
        }
        if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
            return Err(invalid("dispatch_retry.backoff_multiplier must be >= 1.0"));
        }

        let breaker = &self.circuit_breaker;
        if breaker.enabled && (breaker.failure_threshold == 0 || breaker.success_threshold == 0) {
            return Err(invalid(
                "circuit_breaker thresholds must be greater than 0 when enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TransferError {
    TransferError::Configuration(message.into())
}
