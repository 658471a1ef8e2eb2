//! # Transfer Queue Processor
//!
//! Per-shard owner of the transfer cursor. `start()` loads the persisted ack level and
//! spawns a single control loop that alternates between processing one window and
//! waiting out the current poll interval:
//!
//! ```text
//! Stopped ──start()──▶ Running ──stop()──▶ Stopped
//!                        │
//!                        ├─ process_window(read_level, max_allowed_read_level]
//!                        └─ wait(poll_interval) | notify_new_task() | max level raised | shutdown
//! ```
//!
//! The read level lives inside the control loop and is never shared. External callers
//! may only raise the max allowed read level or nudge the loop awake.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::{MatchingClient, VisibilityManager};
use crate::config::{ProcessorConfig, TransferQueueConfig};
use crate::constants::cursor;
use crate::error::{Result, TransferError};
use crate::persistence::{ExecutionStore, ShardContext, TransferQueueStore};

use super::executor::TransferTaskExecutor;
use super::metrics::ProcessorMetrics;
use super::reader::QueueReader;
use super::window::{WindowOutcome, WindowProcessor};

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct TransferQueueProcessor {
    id: Uuid,
    shard: Arc<dyn ShardContext>,
    window: WindowProcessor,
    config: ProcessorConfig,
    max_read_level: watch::Sender<i64>,
    new_task: Arc<Notify>,
    lifecycle: Mutex<Option<RunningLoop>>,
}

impl std::fmt::Debug for TransferQueueProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferQueueProcessor")
            .field("id", &self.id)
            .field("shard_id", &self.shard.shard_id())
            .field("max_allowed_read_level", &*self.max_read_level.borrow())
            .field("config", &self.config)
            .finish()
    }
}

impl TransferQueueProcessor {
    pub fn new(
        shard: Arc<dyn ShardContext>,
        store: Arc<dyn TransferQueueStore>,
        executor: Arc<TransferTaskExecutor>,
        config: &ProcessorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let shard_id = shard.shard_id();
        if executor.shard_id() != shard_id {
            return Err(TransferError::Configuration(format!(
                "executor belongs to shard {} but processor owns shard {shard_id}",
                executor.shard_id()
            )));
        }

        let reader = Arc::new(QueueReader::new(store, shard_id, config.batch_size));
        let window = WindowProcessor::new(reader, executor, Arc::clone(&shard), config);
        let (max_read_level, _) = watch::channel(cursor::INITIAL_ACK_LEVEL);

        Ok(Self {
            id: Uuid::new_v4(),
            shard,
            window,
            config: config.clone(),
            max_read_level,
            new_task: Arc::new(Notify::new()),
            lifecycle: Mutex::new(None),
        })
    }

    /// Build the executor and processor from a full configuration
    pub fn from_config(
        shard: Arc<dyn ShardContext>,
        store: Arc<dyn TransferQueueStore>,
        matching: Arc<dyn MatchingClient>,
        executions: Arc<dyn ExecutionStore>,
        visibility: Arc<dyn VisibilityManager>,
        config: &TransferQueueConfig,
    ) -> Result<Self> {
        config.validate()?;
        let executor = TransferTaskExecutor::from_config(
            shard.shard_id(),
            matching,
            executions,
            visibility,
            config,
        );
        Self::new(shard, store, Arc::new(executor), &config.processor)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn shard_id(&self) -> i32 {
        self.shard.shard_id()
    }

    pub fn metrics(&self) -> Arc<ProcessorMetrics> {
        Arc::clone(self.window.metrics())
    }

    pub fn max_allowed_read_level(&self) -> i64 {
        *self.max_read_level.borrow()
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Load the persisted cursor and spawn the control loop
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            return Err(TransferError::InvalidState(format!(
                "transfer queue processor for shard {} is already running",
                self.shard_id()
            )));
        }

        let ack_level = self.shard.transfer_ack_level().await?;
        let shard_max_read_level = self.shard.transfer_max_read_level().await?;
        self.raise_max_read_level(shard_max_read_level.max(ack_level));

        let metrics = self.metrics();
        let poll_interval = self.window.backoff().min_interval();
        metrics.set_read_level(ack_level);
        metrics.set_poll_interval(poll_interval);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let control_loop = ControlLoop {
            shard_id: self.shard_id(),
            window: self.window.clone(),
            read_level: ack_level,
            completed: BTreeSet::new(),
            poll_interval,
            max_read_level: self.max_read_level.subscribe(),
            new_task: Arc::clone(&self.new_task),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(control_loop.run());

        *lifecycle = Some(RunningLoop { shutdown, handle });

        info!(
            processor_id = %self.id,
            shard_id = self.shard_id(),
            ack_level,
            max_allowed_read_level = self.max_allowed_read_level(),
            "🚀 Transfer queue processor started"
        );
        Ok(())
    }

    /// Signal shutdown and wait for the control loop. Calling it again is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let Some(running) = self.lifecycle.lock().await.take() else {
            debug!(shard_id = self.shard_id(), "Transfer queue processor already stopped");
            return Ok(());
        };

        let _ = running.shutdown.send(true);
        let mut handle = running.handle;

        match tokio::time::timeout(self.config.stop_timeout(), &mut handle).await {
            Ok(Ok(())) => {
                info!(
                    processor_id = %self.id,
                    shard_id = self.shard_id(),
                    "🛑 Transfer queue processor stopped"
                );
                Ok(())
            }
            Ok(Err(join_error)) => Err(TransferError::InvalidState(format!(
                "control loop for shard {} terminated abnormally: {join_error}",
                self.shard_id()
            ))),
            Err(_) => {
                handle.abort();
                warn!(
                    shard_id = self.shard_id(),
                    timeout_ms = self.config.stop_timeout_ms,
                    "Control loop did not stop in time, aborted"
                );
                Err(TransferError::Timeout(format!(
                    "control loop for shard {} did not stop within {:?}",
                    self.shard_id(),
                    self.config.stop_timeout()
                )))
            }
        }
    }

    /// Raise the upper bound of future scan windows. Lowering it is rejected.
    pub fn update_max_allowed_read_level(&self, level: i64) -> Result<()> {
        let current = self.max_allowed_read_level();
        if level < current {
            return Err(TransferError::cursor_invariant(format!(
                "max allowed read level cannot move from {current} down to {level}"
            )));
        }
        self.raise_max_read_level(level);
        Ok(())
    }

    /// New tasks might exist; wake the control loop if it is waiting
    pub fn notify_new_task(&self) {
        self.new_task.notify_one();
    }

    /// Run one window outside the control loop
    pub async fn process_window(
        &self,
        read_level: i64,
        max_level: i64,
        poll_interval: Duration,
    ) -> WindowOutcome {
        self.window
            .process_window(read_level, max_level, poll_interval)
            .await
    }

    fn raise_max_read_level(&self, level: i64) {
        self.max_read_level.send_if_modified(|current| {
            if level > *current {
                *current = level;
                true
            } else {
                false
            }
        });
    }
}

/// State owned by the spawned control loop
struct ControlLoop {
    shard_id: i32,
    window: WindowProcessor,
    read_level: i64,
    /// Completed task ids above `read_level`, held back by an earlier failure
    completed: BTreeSet<i64>,
    poll_interval: Duration,
    max_read_level: watch::Receiver<i64>,
    new_task: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl ControlLoop {
    async fn run(mut self) {
        debug!(
            shard_id = self.shard_id,
            read_level = self.read_level,
            "Transfer queue control loop running"
        );

        loop {
            let max_level = *self.max_read_level.borrow_and_update();

            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                outcome = self.window.process_window_with_completed(
                    self.read_level,
                    max_level,
                    self.poll_interval,
                    &mut self.completed,
                ) => outcome,
            };
            self.read_level = outcome.new_read_level;
            self.poll_interval = outcome.next_poll_interval;

            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = self.new_task.notified() => {}
                changed = self.max_read_level.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        debug!(
            shard_id = self.shard_id,
            read_level = self.read_level,
            "Transfer queue control loop exited"
        );
    }
}
