//! # Circuit Breaker
//!
//! Fails downstream calls fast while a collaborator is unhealthy. Three states:
//! Closed (calls pass), Open (calls are rejected with [`TransferError::CircuitOpen`]),
//! Half-Open (a limited number of probes decide whether to close again). At most
//! `success_threshold` probes are in flight or succeeded at once.
//!
//! Only retryable errors count as failures. A not-found or an unknown task type says
//! nothing about the collaborator's health.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{CircuitBreakerConfig, CircuitBreakerMetrics};
use crate::error::{Result, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    config: CircuitBreakerConfig,
    metrics: Mutex<CircuitBreakerMetrics>,
    opened_at: Mutex<Option<Instant>>,
}

/// Held for the duration of an admitted call; a probe frees its half-open slot on drop,
/// including when the call is cancelled
struct Admission<'a> {
    probe_of: Option<&'a CircuitBreaker>,
}

impl Admission<'_> {
    fn call() -> Self {
        Self { probe_of: None }
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if let Some(breaker) = self.probe_of {
            let mut metrics = breaker.metrics.lock();
            metrics.half_open_in_flight = metrics.half_open_in_flight.saturating_sub(1);
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout.as_secs(),
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            metrics: Mutex::new(CircuitBreakerMetrics::new()),
            opened_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `operation` under circuit breaker protection
    pub async fn call<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(admission) = self.admit() else {
            self.metrics.lock().rejected_count += 1;
            return Err(TransferError::circuit_open(self.name.clone()));
        };

        let started = Instant::now();
        let result = operation().await;
        let duration = started.elapsed();

        match &result {
            Err(err) if err.is_retryable() => self.record_failure(duration),
            _ => self.record_success(duration),
        }
        drop(admission);

        result
    }

    fn admit(&self) -> Option<Admission<'_>> {
        match self.state() {
            CircuitState::Closed => Some(Admission::call()),
            CircuitState::Open => {
                let opened_at = *self.opened_at.lock();
                match opened_at {
                    Some(opened) if opened.elapsed() >= self.config.timeout => {
                        self.transition_to_half_open();
                        self.admit_probe()
                    }
                    Some(_) => None,
                    None => {
                        warn!(component = %self.name, "Circuit open but no timestamp recorded");
                        Some(Admission::call())
                    }
                }
            }
            CircuitState::HalfOpen => self.admit_probe(),
        }
    }

    /// Half-open admits probes only while in-flight plus successful probes stay below
    /// the success threshold
    fn admit_probe(&self) -> Option<Admission<'_>> {
        let mut metrics = self.metrics.lock();
        let admitted = metrics.half_open_in_flight + metrics.half_open_calls;
        if admitted >= self.config.success_threshold as u64 {
            return None;
        }
        metrics.half_open_in_flight += 1;
        Some(Admission { probe_of: Some(self) })
    }

    fn record_success(&self, duration: Duration) {
        let close = {
            let mut metrics = self.metrics.lock();
            metrics.total_calls += 1;
            metrics.success_count += 1;
            metrics.total_duration += duration;
            metrics.consecutive_failures = 0;

            debug!(
                component = %self.name,
                duration_ms = duration.as_millis() as u64,
                "🟢 Operation succeeded"
            );

            if self.state() == CircuitState::HalfOpen {
                metrics.half_open_calls += 1;
                metrics.half_open_calls >= self.config.success_threshold as u64
            } else {
                false
            }
        };

        if close {
            self.transition_to_closed();
        }
    }

    fn record_failure(&self, duration: Duration) {
        let open = {
            let mut metrics = self.metrics.lock();
            metrics.total_calls += 1;
            metrics.failure_count += 1;
            metrics.total_duration += duration;
            metrics.consecutive_failures += 1;

            match self.state() {
                CircuitState::Closed => {
                    metrics.consecutive_failures >= self.config.failure_threshold as u64
                }
                CircuitState::HalfOpen => true,
                CircuitState::Open => false,
            }
        };

        if open {
            self.transition_to_open();
        }
    }

    fn transition_to_closed(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        *self.opened_at.lock() = None;

        let mut metrics = self.metrics.lock();
        metrics.consecutive_failures = 0;
        metrics.half_open_calls = 0;

        info!(
            component = %self.name,
            total_calls = metrics.total_calls,
            "🟢 Circuit breaker closed (recovered)"
        );
    }

    fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        *self.opened_at.lock() = Some(Instant::now());

        let mut metrics = self.metrics.lock();
        metrics.half_open_calls = 0;

        error!(
            component = %self.name,
            consecutive_failures = metrics.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            timeout_seconds = self.config.timeout.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
        self.metrics.lock().half_open_calls = 0;

        info!(
            component = %self.name,
            success_threshold = self.config.success_threshold,
            "🟡 Circuit breaker half-open (testing recovery)"
        );
    }

    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        self.transition_to_open();
    }

    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        self.transition_to_closed();
    }

    /// Metrics snapshot with derived rates
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let mut snapshot = self.metrics.lock().clone();
        snapshot.current_state = self.state();
        if snapshot.total_calls > 0 {
            snapshot.failure_rate = snapshot.failure_count as f64 / snapshot.total_calls as f64;
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn breaker(failure_threshold: usize, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "matching",
            CircuitBreakerConfig {
                failure_threshold,
                timeout,
                success_threshold: 1,
            },
        )
    }

    fn transient() -> TransferError {
        TransferError::dispatch("add_decision_task", "unavailable")
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let circuit = breaker(2, Duration::from_secs(30));

        let _ = circuit.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);
        let _ = circuit.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let result = circuit.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(TransferError::CircuitOpen { .. })));
        assert_eq!(circuit.metrics().rejected_count, 1);
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip() {
        let circuit = breaker(1, Duration::from_secs(30));

        let result = circuit
            .call(|| async {
                Err::<(), _>(TransferError::execution_not_found("d", "wf", "run"))
            })
            .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_recovers_through_half_open() {
        let circuit = breaker(1, Duration::from_millis(20));

        let _ = circuit.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(30)).await;

        let result = circuit.call(|| async { Ok("recovered") }).await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_admits_one_probe_at_a_time() {
        let circuit = breaker(1, Duration::from_millis(20));
        let _ = circuit.call(|| async { Err::<(), _>(transient()) }).await;
        sleep(Duration::from_millis(30)).await;

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let mut probe = Box::pin(circuit.call(|| async move { gate.await.map_err(|_| transient()) }));
        assert!(futures::poll!(&mut probe).is_pending());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert_eq!(circuit.metrics().half_open_in_flight, 1);

        let concurrent = circuit.call(|| async { Ok(()) }).await;
        assert!(matches!(concurrent, Err(TransferError::CircuitOpen { .. })));

        release.send(()).unwrap();
        probe.await.unwrap();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.metrics().half_open_in_flight, 0);
    }

    #[tokio::test]
    async fn test_cancelled_probe_frees_its_slot() {
        let circuit = breaker(1, Duration::from_millis(20));
        let _ = circuit.call(|| async { Err::<(), _>(transient()) }).await;
        sleep(Duration::from_millis(30)).await;

        let mut probe = Box::pin(circuit.call(|| std::future::pending::<Result<()>>()));
        assert!(futures::poll!(&mut probe).is_pending());
        drop(probe);
        assert_eq!(circuit.metrics().half_open_in_flight, 0);

        circuit.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_force_operations() {
        let circuit = breaker(1, Duration::from_secs(1));
        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }
}
