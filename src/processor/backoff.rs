//! Poll interval backoff
//!
//! Drain aggressively while scans keep finding work, back off exponentially when they
//! don't, and never grow past the configured ceiling.

use std::time::Duration;

use crate::config::ProcessorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffController {
    min_interval: Duration,
    max_interval: Duration,
}

impl BackoffController {
    /// `max_interval` below `min_interval` is raised to `min_interval`
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            min_interval,
            max_interval: max_interval.max(min_interval),
        }
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self::new(config.min_poll_interval(), config.max_poll_interval())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Interval to wait before the next scan
    pub fn next_interval(&self, previous: Duration, found_tasks: bool) -> Duration {
        if found_tasks {
            return self.min_interval;
        }

        previous
            .checked_mul(2)
            .unwrap_or(self.max_interval)
            .clamp(self.min_interval, self.max_interval)
    }
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::from_config(&ProcessorConfig::default())
    }
}
