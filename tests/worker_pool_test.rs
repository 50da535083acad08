//! Integration tests for WorkerPool
//!
//! These tests validate real-world functionality including:
//! - Parallel execution on dedicated threads
//! - Failure and panic isolation
//! - Discarding queued work
//! - Custom executors
//! - Graceful shutdown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use prometheus_orchestrator::config::WorkerPoolConfig;
use prometheus_orchestrator::core::{
    Executor, IsolatingExecutor, PoolError, Task, TaskStatus, WorkerPool,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn pool(workers: usize) -> WorkerPool {
    WorkerPool::new(
        WorkerPoolConfig::new().with_worker_count(workers),
        IsolatingExecutor,
    )
    .unwrap()
}

// ============================================================================
// TEST EXECUTORS - Real implementations for testing
// ============================================================================

/// Counts executions before delegating to the isolating executor.
#[derive(Clone, Default)]
struct CountingExecutor {
    executed: Arc<AtomicUsize>,
}

impl Executor for CountingExecutor {
    fn execute(&self, task: Task) -> TaskStatus {
        self.executed.fetch_add(1, Ordering::SeqCst);
        IsolatingExecutor.execute(task)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_concurrent_execution() {
    let pool = pool(4);
    let start = Instant::now();

    for _ in 0..4 {
        pool.put(Task::new(Instant::now(), || {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        }))
        .unwrap();
    }
    pool.sync();

    // Four 200ms jobs on four workers run side by side
    assert!(start.elapsed() < Duration::from_millis(700));
    assert_eq!(pool.stats().completed_tasks, 4);
    pool.destroy();
}

#[test]
fn test_stats_track_submissions() {
    let pool = pool(2);
    let task = Task::new(Instant::now(), || Ok(vec![1, 2, 3])).with_id(9);
    let observer = task.snapshot();
    assert_eq!(observer.status, TaskStatus::Pending);

    let probe = Task::new(Instant::now(), || Ok("probe"));
    pool.put(task).unwrap();
    pool.put(probe).unwrap();
    pool.sync();

    let stats = pool.stats();
    assert_eq!(stats.submitted_tasks, 2);
    assert_eq!(stats.completed_tasks, 2);
    pool.destroy();
}

#[test]
fn test_failures_do_not_stop_workers() {
    let pool = pool(1);
    let ran = Arc::new(AtomicUsize::new(0));

    pool.put(Task::new(Instant::now(), || -> anyhow::Result<()> {
        anyhow::bail!("first job fails")
    }))
    .unwrap();
    pool.put(Task::new(Instant::now(), || -> anyhow::Result<()> {
        panic!("second job panics")
    }))
    .unwrap();
    let counter = Arc::clone(&ran);
    pool.put(Task::new(Instant::now(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .unwrap();
    pool.sync();

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    let stats = pool.stats();
    assert_eq!(stats.failed_tasks, 2);
    assert_eq!(stats.completed_tasks, 1);
    pool.destroy();
}

#[test]
fn test_custom_executor() {
    let executor = CountingExecutor::default();
    let executed = Arc::clone(&executor.executed);
    let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(3), executor).unwrap();

    for i in 0..30 {
        pool.put(Task::new(Instant::now(), move || Ok(i))).unwrap();
    }
    pool.sync();

    assert_eq!(executed.load(Ordering::SeqCst), 30);
    pool.destroy();
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = WorkerPool::new(
        WorkerPoolConfig::new().with_worker_count(0),
        IsolatingExecutor,
    );
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}

#[test]
fn test_graceful_shutdown_drains_queue() {
    let pool = pool(1);
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let ran = Arc::clone(&ran);
        pool.put(Task::new(Instant::now(), move || {
            thread::sleep(Duration::from_millis(10));
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    }
    pool.destroy();

    assert_eq!(ran.load(Ordering::SeqCst), 5);
    assert!(matches!(
        pool.put(Task::new(Instant::now(), || Ok(()))),
        Err(PoolError::PoolShutdown)
    ));
}

#[test]
fn test_sync_on_idle_pool_returns() {
    let pool = pool(2);
    let start = Instant::now();
    pool.sync();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(pool.empty(), 0);
    pool.destroy();
}
