//! Builder for [`ExperimentController`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ControllerConfig, WorkerPoolConfig};
use crate::core::{ControllerResult, ExperimentController};
use crate::infra::{JsonSerializer, Serializer};
use crate::resource::ResourceFactory;

/// Assembles configuration, resource types and a serializer, then starts the
/// controller.
///
/// ```rust,ignore
/// let ec = ControllerBuilder::new()
///     .with_worker_count(4)
///     .with_exp_id("ping-test")
///     .with_resource_type(ResourceFactory::new("node", Node::new))
///     .build()?;
/// ```
pub struct ControllerBuilder {
    config: ControllerConfig,
    types: Vec<ResourceFactory>,
    serializer: Arc<dyn Serializer>,
}

impl ControllerBuilder {
    /// Start from the default configuration; the pool size is read from
    /// `ORCHESTRATOR_NTHREADS` at build time unless set explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(ControllerConfig::default())
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: ControllerConfig) -> Self {
        Self {
            config,
            types: Vec::new(),
            serializer: Arc::new(JsonSerializer::new()),
        }
    }

    /// Replace the worker pool configuration.
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.config.pool.worker_count = Some(worker_count);
        self
    }

    /// Fix the experiment id instead of generating one.
    #[must_use]
    pub fn with_exp_id(mut self, exp_id: impl Into<String>) -> Self {
        self.config.exp_id = Some(exp_id.into());
        self
    }

    /// Root directory for experiment and run directories.
    #[must_use]
    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.local_dir = dir.into();
        self
    }

    /// Persist the experiment on release.
    #[must_use]
    pub const fn with_persist(mut self, persist: bool) -> Self {
        self.config.persist = persist;
        self
    }

    /// Delay between retries of a gated action, in milliseconds.
    #[must_use]
    pub const fn with_reschedule_delay_ms(mut self, ms: u64) -> Self {
        self.config.reschedule_delay_ms = ms;
        self
    }

    /// Interval between readiness checks of a deployment group, in milliseconds.
    #[must_use]
    pub const fn with_barrier_interval_ms(mut self, ms: u64) -> Self {
        self.config.barrier_interval_ms = ms;
        self
    }

    /// Fallback re-check interval of the wait primitives, in milliseconds.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// How long finished tracked tasks stay queryable, in seconds.
    #[must_use]
    pub const fn with_task_ttl_secs(mut self, secs: u64) -> Self {
        self.config.task_ttl_secs = secs;
        self
    }

    /// Register a resource type.
    #[must_use]
    pub fn with_resource_type(mut self, factory: ResourceFactory) -> Self {
        self.types.push(factory);
        self
    }

    /// Use `serializer` for persistence.
    #[must_use]
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Configuration as assembled so far.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Validate the configuration and start the controller.
    ///
    /// # Errors
    ///
    /// Invalid configuration, duplicate resource types or thread spawn failures.
    pub fn build(self) -> ControllerResult<Arc<ExperimentController>> {
        ExperimentController::assemble(self.config, self.types, self.serializer)
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
