//! Configuration models for the controller and its worker pool.

pub mod controller;

pub use controller::{
    parse_worker_count, ControllerConfig, WorkerPoolConfig, DEFAULT_WORKER_COUNT,
    WORKER_COUNT_ENV,
};
