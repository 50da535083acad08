//! Min-heap task scheduler ordered by due time, FIFO among ties.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::core::Task;
use crate::util::TaskId;

/// Wrapper to make Task orderable by due time (earliest first) and arrival within a due time.
struct DueTask {
    task: Task,
}

impl DueTask {
    fn key(&self) -> (Instant, u64) {
        (self.task.due(), self.task.seq())
    }
}

impl PartialEq for DueTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DueTask {}

impl PartialOrd for DueTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DueTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other.key().cmp(&self.key())
    }
}

/// Pending tasks keyed by `(due, arrival sequence)`.
///
/// Not internally locked: the controller keeps it behind the same mutex its
/// scheduling loop waits on.
pub struct TaskScheduler {
    tasks: BinaryHeap<DueTask>,
    next_id: TaskId,
    next_seq: u64,
    awaited: Option<Instant>,
}

impl TaskScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: BinaryHeap::new(),
            next_id: 1,
            next_seq: 0,
            awaited: None,
        }
    }

    /// Insert a task, assigning an id if it has none. O(log n).
    pub fn schedule(&mut self, mut task: Task) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        task.assign(id, self.take_seq());
        let id = task.id().unwrap_or(id);
        self.tasks.push(DueTask { task });
        id
    }

    /// Remove and return the earliest task, due or not.
    pub fn next(&mut self) -> Option<Task> {
        self.tasks.pop().map(|entry| entry.task)
    }

    /// Cancel a pending task. Returns false if it was already popped.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|entry| entry.task.id() != Some(id));
        self.tasks.len() != before
    }

    /// Drop every pending task and return how many were cancelled.
    pub fn clear(&mut self) -> usize {
        let cancelled = self.tasks.len();
        self.tasks.clear();
        cancelled
    }

    /// Due time of the earliest pending task.
    #[must_use]
    pub fn peek_due(&self) -> Option<Instant> {
        self.tasks.peek().map(|entry| entry.task.due())
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Put back a task popped too early, keeping its due time and arrival order.
    pub(crate) fn requeue(&mut self, task: Task) {
        self.tasks.push(DueTask { task });
    }

    /// Record the due time the scheduling loop is sleeping towards.
    pub(crate) const fn set_awaited(&mut self, due: Option<Instant>) {
        self.awaited = due;
    }

    /// Whether a task due at `due` must wake the scheduling loop.
    pub(crate) fn wakes_loop(&self, due: Instant) -> bool {
        self.awaited.is_none_or(|awaited| due < awaited)
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}
