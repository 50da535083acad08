//! Core orchestration: tasks, the scheduler, the worker pool, failure
//! tracking and the experiment controller.

pub mod controller;
pub mod error;
pub mod executor;
pub mod failure;
pub mod scheduler;
pub mod task;
pub mod worker_pool;

pub use controller::{ControllerHandle, ControllerState, ExperimentController};
pub use error::{AppResult, ControllerError, ControllerResult};
pub use executor::{Executor, IsolatingExecutor};
pub use failure::{FailureLevel, FailureManager};
pub use scheduler::TaskScheduler;
pub use task::{Callback, Task, TaskSnapshot, TaskStatus};
pub use worker_pool::{PoolError, PoolStats, WorkerPool};

pub use crate::util::TaskId;
