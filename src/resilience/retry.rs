//! Bounded exponential retry for transient collaborator errors inside a single dispatch.
//!
//! Anything still failing after the last attempt is returned to the caller; the task is
//! then re-offered by a later scan because the cursor does not move past it.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{Result, TransferError};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval,
            multiplier,
            max_interval,
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before attempt `attempt + 1` (attempts are 1-based)
    pub fn interval_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled_ms = self.initial_interval.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = scaled_ms.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped_ms.round() as u64)
    }

    /// An open circuit is not retried in place.
    fn should_retry(err: &TransferError) -> bool {
        err.is_retryable() && !matches!(err, TransferError::CircuitOpen { .. })
    }

    pub async fn retry<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && Self::should_retry(&err) => {
                    let wait = self.interval_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_interval_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.max_interval_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_interval_grows_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(50),
            2.0,
            Duration::from_millis(150),
        );
        assert_eq!(policy.interval_for(1), Duration::from_millis(50));
        assert_eq!(policy.interval_for(2), Duration::from_millis(100));
        assert_eq!(policy.interval_for(3), Duration::from_millis(150));
        assert_eq!(policy.interval_for(10), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 1.0, Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = policy
            .retry("add_activity_task", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransferError::dispatch("add_activity_task", "busy"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 1.0, Duration::from_millis(1));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<()> = policy
            .retry("get_workflow_execution", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransferError::execution_not_found("d", "wf", "run"))
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
