//! Circuit breaker counters

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::circuit_breaker::CircuitState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Calls rejected while open
    pub rejected_count: u64,
    pub consecutive_failures: u64,
    /// Successful probes since the circuit went half-open
    pub half_open_calls: u64,
    /// Probes admitted and not yet finished
    pub half_open_in_flight: u64,
    pub total_duration: Duration,
    pub current_state: CircuitState,
    pub failure_rate: f64,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_count: 0,
            consecutive_failures: 0,
            half_open_calls: 0,
            half_open_in_flight: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            failure_rate: 0.0,
        }
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
