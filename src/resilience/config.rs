//! Circuit breaker tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::defaults;

/// Thresholds of a single circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,
    /// How long the circuit stays open before probing
    pub timeout: Duration,
    /// Successful probes needed to close again
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::CIRCUIT_FAILURE_THRESHOLD,
            timeout: Duration::from_secs(defaults::CIRCUIT_TIMEOUT_SECONDS),
            success_threshold: defaults::CIRCUIT_SUCCESS_THRESHOLD,
        }
    }
}
