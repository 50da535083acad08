//! Deferred units of work.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::TaskId;

/// Boxed task body. The returned value becomes the task result.
pub type Callback = Box<dyn FnOnce() -> anyhow::Result<Value> + Send + 'static>;

/// Execution status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not executed yet.
    Pending,
    /// Callback returned normally.
    Done,
    /// Callback failed or panicked.
    Error,
}

impl TaskStatus {
    /// True once the task has executed, successfully or not.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Shared, mutable half of a task: the worker writes it, the task table reads it.
#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub(crate) status: TaskStatus,
    pub(crate) result: Option<Value>,
    pub(crate) finished_at: Option<Instant>,
}

pub(crate) type SharedRecord = Arc<Mutex<TaskRecord>>;

/// Point-in-time view of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Return value on success, failure description on error.
    pub result: Option<Value>,
}

/// A callback with a due time.
pub struct Task {
    id: Option<TaskId>,
    due: Instant,
    seq: u64,
    callback: Option<Callback>,
    record: SharedRecord,
}

impl Task {
    /// Create a task due at `due`. Any serializable return value is kept as
    /// the task result.
    pub fn new<F, T>(due: Instant, callback: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Serialize,
    {
        let callback: Callback =
            Box::new(move || -> anyhow::Result<Value> { Ok(serde_json::to_value(callback()?)?) });
        Self {
            id: None,
            due,
            seq: 0,
            callback: Some(callback),
            record: Arc::new(Mutex::new(TaskRecord {
                status: TaskStatus::Pending,
                result: None,
                finished_at: None,
            })),
        }
    }

    /// Create a task with a preassigned id.
    #[must_use]
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Task identifier, once assigned.
    #[must_use]
    pub const fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Due timestamp.
    #[must_use]
    pub const fn due(&self) -> Instant {
        self.due
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.record.lock().status
    }

    /// Current result.
    #[must_use]
    pub fn result(&self) -> Option<Value> {
        self.record.lock().result.clone()
    }

    /// Snapshot of id, status and result.
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot {
        snapshot_of(self.id.unwrap_or_default(), &self.record)
    }

    pub(crate) fn assign(&mut self, id: TaskId, seq: u64) {
        if self.id.is_none() {
            self.id = Some(id);
        }
        self.seq = seq;
    }

    pub(crate) const fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn record(&self) -> SharedRecord {
        Arc::clone(&self.record)
    }

    pub(crate) fn take_callback(&mut self) -> Option<Callback> {
        self.callback.take()
    }

    pub(crate) fn complete(&self, value: Value) {
        let mut record = self.record.lock();
        record.status = TaskStatus::Done;
        record.result = Some(value);
        record.finished_at = Some(Instant::now());
    }

    pub(crate) fn fail(&self, description: String) {
        let mut record = self.record.lock();
        record.status = TaskStatus::Error;
        record.result = Some(Value::String(description));
        record.finished_at = Some(Instant::now());
    }
}

pub(crate) fn snapshot_of(id: TaskId, record: &SharedRecord) -> TaskSnapshot {
    let record = record.lock();
    TaskSnapshot {
        id,
        status: record.status,
        result: record.result.clone(),
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("due", &self.due)
            .field("seq", &self.seq)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
