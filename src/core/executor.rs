//! Task execution with failure isolation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::core::{Task, TaskStatus};

/// Runs one dispatched task on a pool worker.
///
/// Implementations must contain every failure of the task: a worker that
/// called `execute` keeps servicing the queue no matter what the callback did.
pub trait Executor: Send + Sync + Clone + 'static {
    /// Execute the task and return its final status.
    fn execute(&self, task: Task) -> TaskStatus;
}

/// Default executor: runs the callback, records its value on success and a
/// description on error or panic.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolatingExecutor;

impl Executor for IsolatingExecutor {
    fn execute(&self, mut task: Task) -> TaskStatus {
        let task_id = task.id().unwrap_or_default();
        let Some(callback) = task.take_callback() else {
            warn!(task_id = task_id, "task has already been executed");
            return task.status();
        };

        match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(value)) => {
                debug!(task_id = task_id, "task done");
                task.complete(value);
                TaskStatus::Done
            }
            Ok(Err(err)) => {
                let description = format!("{err:#}");
                error!(task_id = task_id, error = %description, "task failed");
                task.fail(description);
                TaskStatus::Error
            }
            Err(payload) => {
                let description = format!("task panicked: {}", panic_message(payload.as_ref()));
                error!(task_id = task_id, error = %description, "task failed");
                task.fail(description);
                TaskStatus::Error
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_success_records_value() {
        let task = Task::new(Instant::now(), || Ok(21 * 2));
        let record = task.record();

        assert_eq!(IsolatingExecutor.execute(task), TaskStatus::Done);

        let record = record.lock();
        assert_eq!(record.status, TaskStatus::Done);
        assert_eq!(record.result, Some(serde_json::json!(42)));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_error_is_captured() {
        let task = Task::new(Instant::now(), || -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk on fire"))
        });
        let record = task.record();

        assert_eq!(IsolatingExecutor.execute(task), TaskStatus::Error);

        let record = record.lock();
        assert_eq!(record.status, TaskStatus::Error);
        let text = record.result.as_ref().and_then(|v| v.as_str()).unwrap();
        assert!(text.contains("disk on fire"));
    }

    #[test]
    fn test_panic_is_captured() {
        let task = Task::new(Instant::now(), || -> anyhow::Result<()> { panic!("boom") });
        let record = task.record();

        assert_eq!(IsolatingExecutor.execute(task), TaskStatus::Error);

        let record = record.lock();
        let text = record.result.as_ref().and_then(|v| v.as_str()).unwrap();
        assert!(text.contains("boom"));
    }
}
