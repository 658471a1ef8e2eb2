//! # Resilience Module
//!
//! Fault tolerance around the processor's downstream calls.
//!
//! - **Circuit Breakers**: stop hammering a failing matching service; tasks stay
//!   un-acked and are re-offered once the circuit closes
//! - **Retry Policy**: bounded in-place retries for transient collaborator errors
//!
//! ## Usage
//!
//! ```rust,no_run
//! use transfer_queue::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> transfer_queue::Result<()> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     timeout: Duration::from_secs(30),
//!     success_threshold: 2,
//! };
//!
//! let circuit_breaker = CircuitBreaker::new("matching", config);
//! let dispatched = circuit_breaker.call(|| async { Ok(true) }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;
pub use retry::RetryPolicy;
