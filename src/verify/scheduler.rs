//! Cancellable scheduled continuations
//!
//! Timer callbacks (beat playback, ring expiry, settle and checking delays) are
//! queued here as plain data tagged with the session generation that created
//! them. The owner drains due tasks in time order; tasks from a superseded
//! generation are discarded on the way out.

use std::collections::BTreeMap;

/// Handle for cancelling a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// A task that has come due
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask<T> {
    pub id: TaskId,
    /// Time the task was scheduled to run (ms)
    pub due_ms: u64,
    pub generation: u64,
    pub task: T,
}

/// Time-ordered queue of pending continuations
#[derive(Debug, Clone)]
pub struct TaskQueue<T> {
    /// Keyed by (due time, insertion sequence) so equal deadlines run FIFO
    pending: BTreeMap<(u64, u64), (u64, T)>,
    next_seq: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run at `due_ms` on behalf of `generation`
    pub fn schedule(&mut self, due_ms: u64, generation: u64, task: T) -> TaskId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((due_ms, seq), (generation, task));
        TaskId(seq)
    }

    /// Cancel a pending task; returns false if it already ran or was cancelled
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let key = self.pending.keys().find(|(_, seq)| *seq == id.0).copied();
        match key {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    /// Drop every pending task
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Pop the earliest task due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<DueTask<T>> {
        let (&(due_ms, seq), _) = self.pending.iter().next()?;
        if due_ms > now_ms {
            return None;
        }
        let (generation, task) = self.pending.remove(&(due_ms, seq))?;
        Some(DueTask {
            id: TaskId(seq),
            due_ms,
            generation,
            task,
        })
    }

    /// Deadline of the earliest pending task
    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
