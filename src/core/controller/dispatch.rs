//! The scheduling loop: the single thread that decides when tasks run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::core::executor::panic_message;
use crate::core::{ControllerHandle, ControllerResult, Task, TaskId, TaskScheduler, WorkerPool};

const LOOP_THREAD_NAME: &str = "ec-scheduler";

/// Scheduler monitor plus the pool due tasks are handed to.
pub(crate) struct Dispatcher {
    monitor: Mutex<TaskScheduler>,
    wakeup: Condvar,
    stop: AtomicBool,
    pool: WorkerPool,
}

impl Dispatcher {
    pub(crate) fn new(pool: WorkerPool) -> Self {
        Self {
            monitor: Mutex::new(TaskScheduler::new()),
            wakeup: Condvar::new(),
            stop: AtomicBool::new(false),
            pool,
        }
    }

    pub(crate) const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Queue a task, waking the loop only if it would otherwise oversleep.
    pub(crate) fn schedule(&self, task: Task) -> TaskId {
        let mut scheduler = self.monitor.lock();
        let due = task.due();
        let id = scheduler.schedule(task);
        if scheduler.wakes_loop(due) {
            self.wakeup.notify_one();
        }
        id
    }

    pub(crate) fn cancel(&self, id: TaskId) -> bool {
        self.monitor.lock().remove(id)
    }

    /// Drop every pending task.
    pub(crate) fn clear(&self) -> usize {
        self.monitor.lock().clear()
    }

    pub(crate) fn pending(&self) -> usize {
        self.monitor.lock().len()
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Ask the loop to exit and wake it.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        let _scheduler = self.monitor.lock();
        self.wakeup.notify_all();
    }

    /// One pass of the loop: dispatch the earliest task if it is due,
    /// otherwise sleep until it is or until something earlier arrives.
    fn step(&self) -> ControllerResult<()> {
        let mut scheduler = self.monitor.lock();
        if self.stopped() {
            return Ok(());
        }

        match scheduler.next() {
            None => {
                scheduler.set_awaited(None);
                self.wakeup.wait(&mut scheduler);
            }
            Some(task) if task.due() > Instant::now() => {
                let due = task.due();
                scheduler.requeue(task);
                scheduler.set_awaited(Some(due));
                let _ = self.wakeup.wait_until(&mut scheduler, due);
                scheduler.set_awaited(None);
            }
            Some(task) => {
                drop(scheduler);
                debug!(task_id = task.id().unwrap_or_default(), "dispatching due task");
                self.pool.put(task)?;
            }
        }
        Ok(())
    }
}

/// Spawn the scheduling loop thread.
pub(crate) fn spawn_loop(
    dispatcher: Arc<Dispatcher>,
    controller: ControllerHandle,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(LOOP_THREAD_NAME.to_string())
        .spawn(move || run_loop(&dispatcher, &controller))
}

fn run_loop(dispatcher: &Dispatcher, controller: &ControllerHandle) {
    info!("scheduling loop started");
    while !dispatcher.stopped() {
        let reason = match catch_unwind(AssertUnwindSafe(|| dispatcher.step())) {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => format!("scheduling loop panicked: {}", panic_message(panic.as_ref())),
        };

        error!(error = %reason, "scheduling loop failed");
        if let Ok(ec) = controller.controller() {
            ec.fail_loop();
        }
        break;
    }
    info!("scheduling loop stopped");
}
