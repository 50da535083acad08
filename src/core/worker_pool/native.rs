//! Native implementation of `WorkerPool` using OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv; `sync()` waits on a Condvar
//! - **Fire-and-forget enqueue**: the job queue is unbounded, `put` never blocks
//! - **Clean shutdown**: dropping the sender lets workers drain the queue and exit

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::executor::{Executor, IsolatingExecutor};
use crate::core::{Task, TaskStatus};

use super::{PoolCounters, PoolError, PoolStats};

/// How long `destroy()` waits for each worker before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Count of queued plus running jobs, with a Condvar for `sync()`.
#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }
}

/// Worker pool with dedicated OS threads.
///
/// Tasks dispatched concurrently have no completion-order guarantee relative
/// to each other.
pub struct WorkerPool<E: Executor = IsolatingExecutor> {
    /// Number of worker threads spawned.
    worker_count: usize,

    /// Job sender (to workers). Option allows clean shutdown by dropping.
    job_tx: Mutex<Option<Sender<Task>>>,

    /// Receiver kept by the pool itself so `empty()` can discard queued jobs.
    job_rx: Receiver<Task>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Jobs not yet finished.
    outstanding: Arc<Outstanding>,

    /// Shutdown flag (lock-free atomic).
    shutdown: AtomicBool,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,

    _executor: PhantomData<E>,
}

impl<E: Executor> WorkerPool<E> {
    /// Create a new worker pool and spawn the configured number of threads.
    ///
    /// Without an explicit worker count, `ORCHESTRATOR_NTHREADS` decides.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid and
    /// `PoolError::Internal` if a worker thread cannot be spawned.
    pub fn new(config: WorkerPoolConfig, executor: E) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        let worker_count = config.resolve_worker_count().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = unbounded::<Task>();
        let counters = Arc::new(PoolCounters::default());
        let outstanding = Arc::new(Outstanding::default());

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let worker = spawn_worker(
                worker_id,
                job_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&outstanding),
                executor.clone(),
                config.thread_stack_size,
            )
            .map_err(|e| PoolError::Internal(format!("failed to spawn worker {worker_id}: {e}")))?;
            workers.push(worker);
        }

        info!(
            worker_count = worker_count,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            worker_count,
            job_tx: Mutex::new(Some(job_tx)),
            job_rx,
            counters,
            outstanding,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
            _executor: PhantomData,
        })
    }

    /// Enqueue a task for execution. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` once `destroy()` has been called.
    pub fn put(&self, task: Task) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let task_id = task.id().unwrap_or_default();
        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        self.outstanding.add();
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        if job_tx.send(task).is_err() {
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            self.outstanding.done();
            return Err(PoolError::PoolShutdown);
        }

        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = task_id, "task submitted to worker pool");
        Ok(())
    }

    /// Discard every queued job that no worker has started yet.
    ///
    /// Returns the number of discarded jobs.
    pub fn empty(&self) -> usize {
        let mut discarded = 0;
        while let Ok(task) = self.job_rx.try_recv() {
            debug!(task_id = task.id().unwrap_or_default(), "discarding queued task");
            drop(task);
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            self.counters.discarded_tasks.fetch_add(1, Ordering::Relaxed);
            self.outstanding.done();
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded = discarded, "discarded queued tasks");
        }
        discarded
    }

    /// Block until every queued and running job has completed.
    ///
    /// Must not be called from inside a task callback: the calling worker
    /// would wait for itself.
    pub fn sync(&self) {
        self.outstanding.wait_drained();
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.worker_count)
    }

    /// Stop accepting work and join the workers.
    ///
    /// Workers finish whatever is still queued before they exit. A worker that
    /// does not exit within the join timeout is detached.
    pub fn destroy(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down worker pool");

        // Drop the sender to unblock all workers waiting on recv()
        *self.job_tx.lock() = None;

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        let current = thread::current().id();

        for (idx, worker) in workers.drain(..).enumerate() {
            if worker.thread().id() == current {
                warn!(worker_id = idx, "destroy called from a worker thread - detaching it");
                continue;
            }

            let (tx, rx) = crossbeam_channel::bounded(1);
            let join_thread = thread::spawn(move || {
                let _ = tx.send(worker.join().is_ok());
            });

            match rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(true) => debug!(worker_id = idx, "Worker joined successfully"),
                Ok(false) => warn!(worker_id = idx, "Worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }

        info!(worker_count = worker_count, "Worker pool shut down complete");
    }
}

impl<E: Executor> Drop for WorkerPool<E> {
    fn drop(&mut self) {
        // Signal shutdown but DON'T join workers in Drop; the pool may be
        // dropped from one of its own workers.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            *self.job_tx.lock() = None;
            debug!("WorkerPool dropped without explicit destroy - workers will be detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker<E: Executor>(
    worker_id: usize,
    job_rx: Receiver<Task>,
    counters: Arc<PoolCounters>,
    outstanding: Arc<Outstanding>,
    executor: E,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("ec-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            // When the sender is dropped and the queue drained, recv returns Err
            while let Ok(task) = job_rx.recv() {
                counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                counters.active_tasks.fetch_add(1, Ordering::Relaxed);

                let status = executor.execute(task);

                counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                match status {
                    TaskStatus::Error => counters.failed_tasks.fetch_add(1, Ordering::Relaxed),
                    _ => counters.completed_tasks.fetch_add(1, Ordering::Relaxed),
                };
                outstanding.done();
            }

            debug!(worker_id = worker_id, "Worker thread exiting");
        })
}
