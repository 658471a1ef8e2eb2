//! # Window Processor
//!
//! One full processing cycle over `(read_level, max_level]`:
//!
//! 1. The [`QueueReader`] streams records into a bounded channel, registering each one
//!    with the window's [`AckManager`] before it is handed out
//! 2. `worker_count` dispatch workers drain the channel concurrently through the
//!    [`TransferTaskExecutor`]
//! 3. Once the window drains, the ack level advances over the completed prefix and is
//!    persisted through the shard
//! 4. The next poll interval comes from the [`BackoffController`]
//!
//! Tasks completed behind a failed one stay above the cursor. The control loop carries
//! their ids into the next window, which acks them again without dispatching them.
//!
//! Reader, workers and ack bookkeeping all run inside the caller's task; nothing is
//! spawned, so dropping the future abandons the window without touching the cursor.

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ProcessorConfig;
use crate::logging::log_error;
use crate::models::TransferTaskInfo;
use crate::persistence::ShardContext;

use super::ack_manager::AckManager;
use super::backoff::BackoffController;
use super::executor::TransferTaskExecutor;
use super::metrics::ProcessorMetrics;
use super::reader::QueueReader;

/// What one window cycle did and where the cursor stands afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub tasks_read: usize,
    pub tasks_failed: usize,
    /// Read level after the window; equals the persisted ack level
    pub new_read_level: i64,
    pub next_poll_interval: Duration,
}

#[derive(Clone)]
pub struct WindowProcessor {
    reader: Arc<QueueReader>,
    executor: Arc<TransferTaskExecutor>,
    shard: Arc<dyn ShardContext>,
    backoff: BackoffController,
    worker_count: usize,
    channel_capacity: usize,
    metrics: Arc<ProcessorMetrics>,
}

impl std::fmt::Debug for WindowProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowProcessor")
            .field("shard_id", &self.reader.shard_id())
            .field("backoff", &self.backoff)
            .field("worker_count", &self.worker_count)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl WindowProcessor {
    pub fn new(
        reader: Arc<QueueReader>,
        executor: Arc<TransferTaskExecutor>,
        shard: Arc<dyn ShardContext>,
        config: &ProcessorConfig,
    ) -> Self {
        let metrics = executor.metrics();
        Self {
            reader,
            executor,
            shard,
            backoff: BackoffController::from_config(config),
            worker_count: config.worker_count.max(1),
            channel_capacity: config.channel_capacity.max(1),
            metrics,
        }
    }

    pub fn backoff(&self) -> &BackoffController {
        &self.backoff
    }

    pub fn metrics(&self) -> &Arc<ProcessorMetrics> {
        &self.metrics
    }

    /// Scan, dispatch and acknowledge one window.
    ///
    /// A reader failure keeps both `read_level` and `poll_interval`. Failed tasks keep the
    /// cursor behind them and also keep `poll_interval`.
    pub async fn process_window(
        &self,
        read_level: i64,
        max_level: i64,
        poll_interval: Duration,
    ) -> WindowOutcome {
        let mut completed = BTreeSet::new();
        self.process_window_with_completed(read_level, max_level, poll_interval, &mut completed)
            .await
    }

    /// Like [`Self::process_window`], skipping dispatch of task ids in `completed`.
    ///
    /// `completed` holds ids above `read_level` that an earlier window already processed.
    /// On return it holds the completed ids still above the new read level.
    pub async fn process_window_with_completed(
        &self,
        read_level: i64,
        max_level: i64,
        poll_interval: Duration,
        completed: &mut BTreeSet<i64>,
    ) -> WindowOutcome {
        if max_level <= read_level {
            return self.finish_empty(read_level, poll_interval);
        }

        let ack_manager = Mutex::new(AckManager::new(read_level));
        let failed = AtomicUsize::new(0);
        let (sender, receiver) = mpsc::channel::<TransferTaskInfo>(self.channel_capacity);
        let receiver = tokio::sync::Mutex::new(receiver);

        let acks = &ack_manager;
        let failures = &failed;
        let shared_receiver = &receiver;
        let carried = &*completed;

        let scan = async {
            let result = self
                .reader
                .scan(read_level, max_level, &sender, |task| {
                    acks.lock().register(task.task_id)
                })
                .await;
            drop(sender);
            result
        };

        let workers = (0..self.worker_count).map(move |worker_id| async move {
            loop {
                let next = shared_receiver.lock().await.recv().await;
                let Some(task) = next else {
                    break;
                };

                let acked = if carried.contains(&task.task_id) {
                    self.metrics.record_already_completed();
                    acks.lock().complete(task.task_id)
                } else {
                    match self.executor.execute(&task).await {
                        Ok(_) => acks.lock().complete(task.task_id),
                        Err(_) => {
                            failures.fetch_add(1, Ordering::Relaxed);
                            acks.lock().fail(task.task_id)
                        }
                    }
                };
                if let Err(err) = acked {
                    warn!(worker_id, task_id = task.task_id, error = %err, "Ack bookkeeping rejected task");
                }
            }
        });

        let (scan_result, _) = tokio::join!(scan, join_all(workers));
        let tasks_failed = failed.into_inner();

        let scan = match scan_result {
            Ok(scan) => scan,
            Err(err) => {
                self.metrics.record_read_failure(&err);
                log_error(
                    "queue_reader",
                    "scan",
                    &err.to_string(),
                    Some(&format!(
                        "shard_id={} read_level={read_level} max_level={max_level}",
                        self.reader.shard_id()
                    )),
                );
                return WindowOutcome {
                    tasks_read: 0,
                    tasks_failed,
                    new_read_level: read_level,
                    next_poll_interval: poll_interval,
                };
            }
        };

        let mut ack_manager = ack_manager.into_inner();
        let mut completed_in_window: BTreeSet<i64> = ack_manager.completed_ids().collect();
        let ack_level = ack_manager.update_ack_level();
        let new_read_level = if ack_level > read_level {
            self.persist_ack_level(read_level, ack_level).await
        } else {
            read_level
        };
        *completed = completed_in_window.split_off(&new_read_level.saturating_add(1));

        let next_poll_interval = if tasks_failed > 0 {
            poll_interval
        } else {
            self.backoff.next_interval(poll_interval, scan.found_tasks())
        };

        self.metrics.record_window(scan.tasks_read);
        self.metrics.set_poll_interval(next_poll_interval);

        debug!(
            shard_id = self.reader.shard_id(),
            tasks_read = scan.tasks_read,
            tasks_failed,
            outstanding = ack_manager.outstanding_count(),
            held_completed = completed.len(),
            read_level = new_read_level,
            next_poll_ms = next_poll_interval.as_millis() as u64,
            "Window processed"
        );

        WindowOutcome {
            tasks_read: scan.tasks_read,
            tasks_failed,
            new_read_level,
            next_poll_interval,
        }
    }

    fn finish_empty(&self, read_level: i64, poll_interval: Duration) -> WindowOutcome {
        let next_poll_interval = self.backoff.next_interval(poll_interval, false);
        self.metrics.record_window(0);
        self.metrics.set_poll_interval(next_poll_interval);
        WindowOutcome {
            tasks_read: 0,
            tasks_failed: 0,
            new_read_level: read_level,
            next_poll_interval,
        }
    }

    /// The cursor only moves when the shard accepted the new level
    async fn persist_ack_level(&self, read_level: i64, ack_level: i64) -> i64 {
        match self.shard.update_transfer_ack_level(ack_level).await {
            Ok(()) => {
                self.metrics.record_ack_level(ack_level);
                ack_level
            }
            Err(err) => {
                self.metrics.record_ack_persist_failure(&err);
                log_error(
                    "transfer_queue_processor",
                    "update_transfer_ack_level",
                    &err.to_string(),
                    Some(&format!(
                        "shard_id={} ack_level={ack_level} kept_read_level={read_level}",
                        self.reader.shard_id()
                    )),
                );
                read_level
            }
        }
    }
}
