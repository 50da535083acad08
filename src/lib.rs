//! # Prometheus Orchestrator
//!
//! An experiment orchestration controller: it drives a set of resource
//! managers (hosts, applications, network elements) through their lifecycle
//! by scheduling timed tasks on a worker pool.
//!
//! ## Core Problem Solved
//!
//! Experiments on real or emulated infrastructure involve many resources whose
//! lifecycles depend on each other:
//!
//! - **Ordering**: an application must not start before its host is ready
//! - **Cohorts**: a group of resources should start together, once all are deployed
//! - **Failures**: a critical resource failing must stop the orchestration promptly
//! - **Slow steps**: provisioning can take minutes and must not stall scheduling
//!
//! ## Key Features
//!
//! - **Time-Ordered Scheduling**: a min-heap of tasks, FIFO among equal due times
//! - **Single Scheduling Authority**: one loop thread decides when, a worker pool runs what
//! - **Failure Isolation**: a failing or panicking task only marks itself `ERROR`
//! - **Conditions**: gate deploy/start/stop of a resource on other resources' states
//! - **Deployment Barriers**: start a group only once every member is `READY`
//! - **Escalating Failure Level**: critical failures set `abort`, waking every waiter
//! - **Persistence**: JSON snapshots of the experiment on release
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_orchestrator::builders::ControllerBuilder;
//! use prometheus_orchestrator::resource::{ResourceCore, ResourceFactory, ResourceManager};
//!
//! struct Node(ResourceCore);
//!
//! impl ResourceManager for Node {
//!     fn core(&self) -> &ResourceCore {
//!         &self.0
//!     }
//! }
//!
//! let ec = ControllerBuilder::new()
//!     .with_resource_type(ResourceFactory::new("node", Node))
//!     .build()?;
//! let a = ec.register_resource("node")?;
//! let b = ec.register_resource("node")?;
//! ec.deploy(None, true, None)?;
//! ec.wait_started(&[a, b])?;
//! ec.shutdown()?;
//! ```
//!
//! For complete scenarios, see `tests/controller_test.rs`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Tasks, scheduler, worker pool, failure tracking and the controller.
pub mod core;
/// Configuration models for the controller and its worker pool.
pub mod config;
/// Builders to construct a controller from configuration.
pub mod builders;
/// Infrastructure adapters for persistence backends.
pub mod infra;
/// Resource managers and their lifecycle.
pub mod resource;
/// Runtime adapters for async callers.
pub mod runtime;
/// Shared utilities.
pub mod util;
