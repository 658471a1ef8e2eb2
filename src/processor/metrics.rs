//! # Processor Metrics
//!
//! Lock-free counters describing what the transfer queue processor has been doing:
//! scan windows, dispatch outcomes, cursor persistence and the current poll interval.
//! One handle is shared (via `Arc`) between the control loop and the task executor;
//! [`ProcessorMetrics::snapshot`] produces a serializable view for health endpoints.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::TransferError;

#[derive(Debug)]
pub struct ProcessorMetrics {
    started_at: Instant,
    windows_scanned: AtomicU64,
    empty_polls: AtomicU64,
    tasks_read: AtomicU64,
    tasks_dispatched: AtomicU64,
    tasks_skipped: AtomicU64,
    tasks_already_completed: AtomicU64,
    tasks_failed: AtomicU64,
    read_failures: AtomicU64,
    ack_level_updates: AtomicU64,
    ack_persist_failures: AtomicU64,
    read_level: AtomicI64,
    poll_interval_ms: AtomicU64,
    error_counts: DashMap<&'static str, u64>,
}

/// Point-in-time copy of [`ProcessorMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorMetricsSnapshot {
    pub collected_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub windows_scanned: u64,
    pub empty_polls: u64,
    pub tasks_read: u64,
    pub tasks_dispatched: u64,
    /// Tasks whose target execution no longer existed
    pub tasks_skipped: u64,
    /// Re-read tasks not dispatched again because an earlier window completed them
    pub tasks_already_completed: u64,
    pub tasks_failed: u64,
    pub read_failures: u64,
    pub ack_level_updates: u64,
    pub ack_persist_failures: u64,
    pub read_level: i64,
    pub poll_interval_ms: u64,
    pub error_counts: HashMap<String, u64>,
}

impl Default for ProcessorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            windows_scanned: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            tasks_read: AtomicU64::new(0),
            tasks_dispatched: AtomicU64::new(0),
            tasks_skipped: AtomicU64::new(0),
            tasks_already_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            ack_level_updates: AtomicU64::new(0),
            ack_persist_failures: AtomicU64::new(0),
            read_level: AtomicI64::new(0),
            poll_interval_ms: AtomicU64::new(0),
            error_counts: DashMap::new(),
        }
    }

    /// A window finished scanning `tasks_read` records
    pub fn record_window(&self, tasks_read: usize) {
        self.windows_scanned.fetch_add(1, Ordering::Relaxed);
        self.tasks_read
            .fetch_add(tasks_read as u64, Ordering::Relaxed);
        if tasks_read == 0 {
            self.empty_polls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.tasks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_already_completed(&self) {
        self.tasks_already_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, error: &TransferError) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.record_error(error);
    }

    pub fn record_read_failure(&self, error: &TransferError) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
        self.record_error(error);
    }

    pub fn record_ack_level(&self, ack_level: i64) {
        self.ack_level_updates.fetch_add(1, Ordering::Relaxed);
        self.read_level.store(ack_level, Ordering::Release);
    }

    pub fn record_ack_persist_failure(&self, error: &TransferError) {
        self.ack_persist_failures.fetch_add(1, Ordering::Relaxed);
        self.record_error(error);
    }

    /// Read level the control loop resumed from
    pub fn set_read_level(&self, read_level: i64) {
        self.read_level.store(read_level, Ordering::Release);
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        self.poll_interval_ms
            .store(interval.as_millis() as u64, Ordering::Release);
    }

    fn record_error(&self, error: &TransferError) {
        *self.error_counts.entry(error.kind()).or_insert(0) += 1;
    }

    pub fn tasks_dispatched(&self) -> u64 {
        self.tasks_dispatched.load(Ordering::Relaxed)
    }

    pub fn tasks_already_completed(&self) -> u64 {
        self.tasks_already_completed.load(Ordering::Relaxed)
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn read_level(&self) -> i64 {
        self.read_level.load(Ordering::Acquire)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> ProcessorMetricsSnapshot {
        ProcessorMetricsSnapshot {
            collected_at: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            windows_scanned: self.windows_scanned.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            tasks_read: self.tasks_read.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_skipped: self.tasks_skipped.load(Ordering::Relaxed),
            tasks_already_completed: self.tasks_already_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            ack_level_updates: self.ack_level_updates.load(Ordering::Relaxed),
            ack_persist_failures: self.ack_persist_failures.load(Ordering::Relaxed),
            read_level: self.read_level.load(Ordering::Acquire),
            poll_interval_ms: self.poll_interval_ms.load(Ordering::Acquire),
            error_counts: self
                .error_counts
                .iter()
                .map(|entry| (entry.key().to_string(), *entry.value()))
                .collect(),
        }
    }
}

impl ProcessorMetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
