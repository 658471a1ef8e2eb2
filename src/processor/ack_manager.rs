//! # Ack Manager
//!
//! Tracks the tasks of one scan window between the moment the reader hands them out
//! and the moment the cursor may move past them. The ack level only advances over a
//! contiguous prefix of successfully processed tasks, so a failed task (and everything
//! read after it) is offered again by the next scan while nothing before it is.
//! [`AckManager::completed_ids`] lets the caller remember which of the re-offered tasks
//! already succeeded.

use std::collections::BTreeMap;

use crate::error::{Result, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckState {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct AckManager {
    ack_level: i64,
    read_level: i64,
    outstanding: BTreeMap<i64, AckState>,
}

impl AckManager {
    pub fn new(ack_level: i64) -> Self {
        Self {
            ack_level,
            read_level: ack_level,
            outstanding: BTreeMap::new(),
        }
    }

    /// Highest task id acknowledged so far
    pub fn ack_level(&self) -> i64 {
        self.ack_level
    }

    /// Highest task id handed out so far
    pub fn read_level(&self) -> i64 {
        self.read_level
    }

    /// Register a task as handed out. Ids must arrive in strictly increasing order.
    pub fn register(&mut self, task_id: i64) -> Result<()> {
        if task_id <= self.read_level {
            return Err(TransferError::cursor_invariant(format!(
                "task {task_id} registered at or below read level {}",
                self.read_level
            )));
        }
        self.outstanding.insert(task_id, AckState::Pending);
        self.read_level = task_id;
        Ok(())
    }

    pub fn complete(&mut self, task_id: i64) -> Result<()> {
        self.resolve(task_id, AckState::Completed)
    }

    pub fn fail(&mut self, task_id: i64) -> Result<()> {
        self.resolve(task_id, AckState::Failed)
    }

    fn resolve(&mut self, task_id: i64, state: AckState) -> Result<()> {
        match self.outstanding.get_mut(&task_id) {
            Some(current @ AckState::Pending) => {
                *current = state;
                Ok(())
            }
            Some(_) => Err(TransferError::cursor_invariant(format!(
                "task {task_id} resolved twice"
            ))),
            None => Err(TransferError::cursor_invariant(format!(
                "task {task_id} was never read (ack level {}, read level {})",
                self.ack_level, self.read_level
            ))),
        }
    }

    /// Advance the ack level over the completed prefix and return it
    pub fn update_ack_level(&mut self) -> i64 {
        while let Some(entry) = self.outstanding.first_entry() {
            if *entry.get() != AckState::Completed {
                break;
            }
            self.ack_level = *entry.key();
            entry.remove();
        }
        self.ack_level
    }

    /// Tasks handed out but not yet acknowledged
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn failed_count(&self) -> usize {
        self.outstanding
            .values()
            .filter(|state| **state == AckState::Failed)
            .count()
    }

    /// Completed tasks still held back by an earlier failed or pending task
    pub fn completed_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.outstanding
            .iter()
            .filter(|(_, state)| **state == AckState::Completed)
            .map(|(task_id, _)| *task_id)
    }
}
