//! Worker count override through `ORCHESTRATOR_NTHREADS`.
//!
//! Kept in its own test binary with a single test: the variable is process
//! wide and other tests build controllers concurrently.

use prometheus_orchestrator::builders::ControllerBuilder;
use prometheus_orchestrator::config::{ControllerConfig, WORKER_COUNT_ENV};
use prometheus_orchestrator::core::{ControllerError, ExperimentController};

#[test]
fn test_worker_count_override_on_default_construction() {
    std::env::set_var(WORKER_COUNT_ENV, "not-a-number");
    let err = ControllerBuilder::new().build().unwrap_err();
    assert!(matches!(err, ControllerError::InvalidConfig(_)));
    let err = ExperimentController::new(ControllerConfig::default()).unwrap_err();
    assert!(matches!(err, ControllerError::InvalidConfig(_)));

    std::env::set_var(WORKER_COUNT_ENV, "0");
    assert!(ControllerBuilder::new().build().is_err());

    // An explicit count wins over the environment.
    let ec = ControllerBuilder::new().with_worker_count(2).build().unwrap();
    assert_eq!(ec.pool_stats().worker_count, 2);
    ec.shutdown().unwrap();

    std::env::set_var(WORKER_COUNT_ENV, "3");
    let ec = ControllerBuilder::new().build().unwrap();
    assert_eq!(ec.pool_stats().worker_count, 3);
    assert_eq!(ec.config().pool.worker_count, Some(3));
    ec.shutdown().unwrap();

    std::env::remove_var(WORKER_COUNT_ENV);
}
