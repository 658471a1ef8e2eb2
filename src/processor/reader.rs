//! # Queue Reader
//!
//! One bounded scan of the transfer queue over `(read_level, max_read_level]`. Pages are
//! read from the store and streamed into a bounded channel in increasing `task_id`
//! order, so a slow consumer applies backpressure to the scan. The reader never waits
//! for new tasks to show up; re-polling is the control loop's job.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::error::{Result, TransferError};
use crate::models::TransferTaskInfo;
use crate::persistence::{ReadTransferTasksRequest, TransferQueueStore};

/// Result of a completed scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub tasks_read: usize,
    pub pages_read: usize,
    /// Highest task id handed out, if any
    pub last_task_id: Option<i64>,
}

impl ScanResult {
    pub fn found_tasks(&self) -> bool {
        self.tasks_read > 0
    }
}

pub struct QueueReader {
    store: Arc<dyn TransferQueueStore>,
    shard_id: i32,
    batch_size: usize,
}

impl std::fmt::Debug for QueueReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueReader")
            .field("shard_id", &self.shard_id)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl QueueReader {
    pub fn new(store: Arc<dyn TransferQueueStore>, shard_id: i32, batch_size: usize) -> Self {
        Self {
            store,
            shard_id,
            batch_size: batch_size.max(1),
        }
    }

    pub fn shard_id(&self) -> i32 {
        self.shard_id
    }

    /// Scan the window, sending every record to `sender`.
    ///
    /// `on_read` sees each record before it is sent; an error from it aborts the scan.
    /// A closed receiver also aborts the scan. No cursor is touched here.
    #[instrument(skip(self, sender, on_read), fields(shard_id = self.shard_id))]
    pub async fn scan<F>(
        &self,
        read_level: i64,
        max_read_level: i64,
        sender: &mpsc::Sender<TransferTaskInfo>,
        mut on_read: F,
    ) -> Result<ScanResult>
    where
        F: FnMut(&TransferTaskInfo) -> Result<()>,
    {
        let mut result = ScanResult::default();
        if max_read_level <= read_level {
            return Ok(result);
        }

        let mut last_task_id = read_level;
        let mut next_page_token = None;

        loop {
            let response = self
                .store
                .read_transfer_tasks(ReadTransferTasksRequest {
                    shard_id: self.shard_id,
                    read_level,
                    max_read_level,
                    batch_size: self.batch_size,
                    next_page_token: next_page_token.take(),
                })
                .await?;
            result.pages_read += 1;

            let page_len = response.tasks.len();
            for task in response.tasks {
                if task.task_id <= last_task_id || task.task_id > max_read_level {
                    return Err(TransferError::queue_store(
                        "read_transfer_tasks",
                        format!(
                            "task {} outside window ({last_task_id}, {max_read_level}] or out of order",
                            task.task_id
                        ),
                    ));
                }
                last_task_id = task.task_id;

                on_read(&task)?;
                sender.send(task).await.map_err(|_| {
                    TransferError::InvalidState("transfer task channel closed during scan".into())
                })?;

                result.tasks_read += 1;
                result.last_task_id = Some(last_task_id);
            }

            match response.next_page_token {
                Some(token) if page_len > 0 => next_page_token = Some(token),
                _ => break,
            }
        }

        debug!(
            read_level,
            max_read_level,
            tasks_read = result.tasks_read,
            pages_read = result.pages_read,
            "Scan window exhausted"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::task_types;
    use crate::models::WorkflowExecution;
    use crate::persistence::InMemoryTransferQueue;

    fn seeded_queue(count: i64) -> Arc<InMemoryTransferQueue> {
        let queue = Arc::new(InMemoryTransferQueue::new());
        let execution = WorkflowExecution::new("wf-1", "run-1");
        for schedule_id in 0..count {
            queue.append(
                1,
                TransferTaskInfo::new(0, task_types::ACTIVITY_TASK, "domain", &execution)
                    .with_task_list("tl")
                    .with_schedule_id(schedule_id),
            );
        }
        queue
    }

    #[tokio::test]
    async fn test_scan_streams_tasks_in_order_across_pages() {
        let queue = seeded_queue(7);
        let reader = QueueReader::new(queue.clone(), 1, 3);
        let (tx, mut rx) = mpsc::channel(16);

        let result = reader.scan(0, i64::MAX, &tx, |_| Ok(())).await.unwrap();
        drop(tx);

        assert_eq!(result.tasks_read, 7);
        assert_eq!(result.pages_read, 3);

        let mut ids = Vec::new();
        while let Some(task) = rx.recv().await {
            ids.push(task.task_id);
        }
        assert_eq!(ids.len(), 7);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(result.last_task_id, ids.last().copied());
    }

    #[tokio::test]
    async fn test_empty_window_reads_nothing() {
        let queue = seeded_queue(2);
        let reader = QueueReader::new(queue.clone(), 1, 10);
        let (tx, _rx) = mpsc::channel(4);

        let result = reader.scan(5, 5, &tx, |_| Ok(())).await.unwrap();
        assert_eq!(result, ScanResult::default());
        assert_eq!(queue.read_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_error_is_surfaced() {
        let queue = seeded_queue(2);
        queue.fail_next_reads(1);
        let reader = QueueReader::new(queue, 1, 10);
        let (tx, _rx) = mpsc::channel(4);

        let err = reader.scan(0, i64::MAX, &tx, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, TransferError::QueueStore { .. }));
    }

    #[tokio::test]
    async fn test_on_read_sees_every_task_before_send() {
        let queue = seeded_queue(4);
        let reader = QueueReader::new(queue, 1, 2);
        let (tx, _rx) = mpsc::channel(8);
        let mut seen = Vec::new();

        reader
            .scan(0, i64::MAX, &tx, |task| {
                seen.push(task.schedule_id);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
