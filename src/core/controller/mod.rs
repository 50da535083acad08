//! The experiment controller.
//!
//! [`ExperimentController`] owns the resource registry, the scheduler, the
//! worker pool, the failure manager and the deployment groups. One dedicated
//! thread (the scheduling loop) decides when tasks run; the pool runs them.
//!
//! ```rust,ignore
//! use prometheus_orchestrator::config::ControllerConfig;
//! use prometheus_orchestrator::core::ExperimentController;
//!
//! let ec = ExperimentController::new(ControllerConfig::default())?;
//! ec.register_resource_type(ResourceFactory::new("node", Node::new))?;
//! let node = ec.register_resource("node")?;
//! ec.deploy(None, true, None)?;
//! ec.wait_started(&[node])?;
//! ec.shutdown()?;
//! ```

mod deploy;
mod dispatch;
mod handle;
mod release;
mod signal;
mod wait;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::core::task::{snapshot_of, SharedRecord};
use crate::core::{
    AppResult, ControllerError, ControllerResult, FailureLevel, FailureManager, IsolatingExecutor,
    PoolStats, Task, TaskSnapshot, WorkerPool,
};
use crate::infra::{
    ExperimentSnapshot, JsonSerializer, ResourceSnapshot, SerializeFormat, Serializer,
};
use crate::resource::{
    AttrValue, Condition, ResourceAction, ResourceFactory, ResourceManager, ResourceState,
    TraceAttr,
};
use crate::util::{
    deadline, now_ms, parse_delay, run_stamp, saturating_deadline, GroupId, Guid, IdGenerator,
    TaskId,
};

pub use handle::ControllerHandle;

use dispatch::{spawn_loop, Dispatcher};
use signal::StateSignal;

/// Lifecycle of the controller itself. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    /// Accepting and dispatching work.
    Running,
    /// The scheduling loop failed.
    Failed,
    /// Every resource has been released.
    Released,
    /// Shut down.
    Terminated,
}

impl ControllerState {
    const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Failed | Self::Released | Self::Terminated)
                | (Self::Failed | Self::Released, Self::Terminated)
        )
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Released => "RELEASED",
            Self::Terminated => "TERMINATED",
        })
    }
}

type Registry = BTreeMap<Guid, Arc<dyn ResourceManager>>;

/// Orchestrates the lifecycle of a set of resource managers.
pub struct ExperimentController {
    config: ControllerConfig,
    exp_id: String,
    run_id: String,
    guids: IdGenerator,
    group_ids: IdGenerator,
    types: RwLock<BTreeMap<String, ResourceFactory>>,
    resources: RwLock<Registry>,
    groups: Mutex<BTreeMap<GroupId, Vec<Guid>>>,
    tasks: Mutex<HashMap<TaskId, SharedRecord>>,
    state: RwLock<ControllerState>,
    failure: FailureManager,
    signal: StateSignal,
    dispatcher: Arc<Dispatcher>,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
    serializer: Arc<dyn Serializer>,
    release_guard: Mutex<()>,
    handle: ControllerHandle,
}

impl ExperimentController {
    /// Create a controller and start its scheduling loop.
    ///
    /// Without an explicit worker count, the pool size comes from
    /// `ORCHESTRATOR_NTHREADS`.
    ///
    /// # Errors
    ///
    /// Invalid configuration (including a malformed worker count override), or a worker or loop thread that cannot be spawned.
    pub fn new(config: ControllerConfig) -> ControllerResult<Arc<Self>> {
        Self::assemble(config, Vec::new(), Arc::new(JsonSerializer::new()))
    }

    pub(crate) fn assemble(
        mut config: ControllerConfig,
        types: Vec<ResourceFactory>,
        serializer: Arc<dyn Serializer>,
    ) -> ControllerResult<Arc<Self>> {
        config.validate().map_err(ControllerError::InvalidConfig)?;
        let workers = config
            .pool
            .resolve_worker_count()
            .map_err(ControllerError::InvalidConfig)?;
        config.pool.worker_count = Some(workers);

        let mut registered = BTreeMap::new();
        for factory in types {
            let rtype = factory.rtype().to_string();
            if registered.insert(rtype.clone(), factory).is_some() {
                return Err(ControllerError::DuplicateResourceType(rtype));
            }
        }

        let pool = WorkerPool::new(config.pool.clone(), IsolatingExecutor)?;
        let dispatcher = Arc::new(Dispatcher::new(pool));
        let exp_id = config
            .exp_id
            .clone()
            .unwrap_or_else(|| format!("exp-{}", uuid::Uuid::new_v4().simple()));

        let ec = Arc::new_cyclic(|weak| {
            let handle = ControllerHandle::new(weak.clone());
            Self {
                exp_id,
                run_id: run_stamp(),
                guids: IdGenerator::default(),
                group_ids: IdGenerator::default(),
                types: RwLock::new(registered),
                resources: RwLock::new(BTreeMap::new()),
                groups: Mutex::new(BTreeMap::new()),
                tasks: Mutex::new(HashMap::new()),
                state: RwLock::new(ControllerState::Running),
                failure: FailureManager::new(handle.clone()),
                signal: StateSignal::default(),
                dispatcher: Arc::clone(&dispatcher),
                loop_thread: Mutex::new(None),
                serializer,
                release_guard: Mutex::new(()),
                handle,
                config,
            }
        });

        let worker = spawn_loop(dispatcher, ec.handle.clone())?;
        *ec.loop_thread.lock() = Some(worker);

        info!(
            exp_id = %ec.exp_id,
            run_id = %ec.run_id,
            workers = workers,
            "experiment controller started"
        );
        Ok(ec)
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Weak handle to this controller.
    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Experiment id.
    #[must_use]
    pub fn exp_id(&self) -> &str {
        &self.exp_id
    }

    /// Run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// `<local_dir>/<exp_id>`, created if missing.
    ///
    /// # Errors
    ///
    /// The directory cannot be created.
    pub fn exp_dir(&self) -> ControllerResult<PathBuf> {
        let dir = self.config.local_dir.join(&self.exp_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `<exp_dir>/<run_id>`, created if missing.
    ///
    /// # Errors
    ///
    /// The directory cannot be created.
    pub fn run_dir(&self) -> ControllerResult<PathBuf> {
        let dir = self.exp_dir()?.join(&self.run_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Controller state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        *self.state.read()
    }

    /// True once a critical resource failure was reported.
    #[must_use]
    pub fn abort(&self) -> bool {
        self.failure.abort()
    }

    /// Current failure level.
    #[must_use]
    pub fn failure_level(&self) -> FailureLevel {
        self.failure.level()
    }

    /// Report that `guid` may have failed. Escalates to `RM_FAILURE` if it is
    /// a critical resource in `FAILED`.
    pub fn inform_failure(&self, guid: Guid) {
        self.failure.eval_failure(guid);
        self.signal.notify();
    }

    pub(crate) const fn signal(&self) -> &StateSignal {
        &self.signal
    }

    /// Worker pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.dispatcher.pool().stats()
    }

    /// Tasks waiting in the scheduler.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.dispatcher.pending()
    }

    fn transition(&self, next: ControllerState) -> bool {
        let mut state = self.state.write();
        if !state.can_become(next) {
            return false;
        }
        *state = next;
        drop(state);
        self.signal.notify();
        true
    }

    /// Called by the scheduling loop when it cannot continue.
    pub(crate) fn fail_loop(&self) {
        self.failure.set_ec_failure();
        if self.transition(ControllerState::Failed) {
            error!(exp_id = %self.exp_id, "experiment controller failed");
        }
    }

    // -- resource types and registry ------------------------------------

    /// Register a resource type.
    ///
    /// # Errors
    ///
    /// `DuplicateResourceType` if the name is taken.
    pub fn register_resource_type(&self, factory: ResourceFactory) -> ControllerResult<()> {
        let mut types = self.types.write();
        if types.contains_key(factory.rtype()) {
            return Err(ControllerError::DuplicateResourceType(factory.rtype().to_string()));
        }
        debug!(rtype = %factory.rtype(), "resource type registered");
        types.insert(factory.rtype().to_string(), factory);
        Ok(())
    }

    /// Registered resource type names.
    #[must_use]
    pub fn resource_types(&self) -> Vec<String> {
        self.types.read().keys().cloned().collect()
    }

    /// Create a resource manager of type `rtype` and return its guid.
    ///
    /// # Errors
    ///
    /// `UnknownResourceType`.
    pub fn register_resource(&self, rtype: &str) -> ControllerResult<Guid> {
        let factory = self
            .types
            .read()
            .get(rtype)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownResourceType(rtype.to_string()))?;
        let guid = self.guids.next_id();
        let rm = factory.create(guid, self.handle.clone());
        self.resources.write().insert(guid, rm);
        debug!(guid = guid, rtype = rtype, "resource registered");
        Ok(guid)
    }

    /// Resource manager registered under `guid`.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn get_resource(&self, guid: Guid) -> ControllerResult<Arc<dyn ResourceManager>> {
        self.resources
            .read()
            .get(&guid)
            .cloned()
            .ok_or(ControllerError::UnknownResource(guid))
    }

    /// Drop a resource manager from the registry and return it.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn remove_resource(&self, guid: Guid) -> ControllerResult<Arc<dyn ResourceManager>> {
        let rm = self
            .resources
            .write()
            .remove(&guid)
            .ok_or(ControllerError::UnknownResource(guid))?;
        debug!(guid = guid, "resource removed");
        self.signal.notify();
        Ok(rm)
    }

    /// Every registered guid, ascending.
    #[must_use]
    pub fn resources(&self) -> Vec<Guid> {
        self.resources.read().keys().copied().collect()
    }

    /// Guids of every resource of type `rtype`.
    #[must_use]
    pub fn filter_resources(&self, rtype: &str) -> Vec<Guid> {
        self.resources
            .read()
            .values()
            .filter(|rm| rm.rtype() == rtype)
            .map(|rm| rm.guid())
            .collect()
    }

    fn resources_where(&self, pred: impl Fn(&dyn ResourceManager) -> bool) -> Vec<Guid> {
        self.resources
            .read()
            .values()
            .filter(|rm| pred(rm.as_ref()))
            .map(|rm| rm.guid())
            .collect()
    }

    fn check_known(&self, guids: &[Guid]) -> ControllerResult<()> {
        let resources = self.resources.read();
        match guids.iter().find(|guid| !resources.contains_key(guid)) {
            Some(&guid) => Err(ControllerError::UnknownResource(guid)),
            None => Ok(()),
        }
    }

    // -- resource pass-throughs -----------------------------------------

    /// Read an attribute of `guid`.
    ///
    /// # Errors
    ///
    /// `UnknownResource` or `UnknownAttribute`.
    pub fn get(&self, guid: Guid, name: &str) -> ControllerResult<AttrValue> {
        self.get_resource(guid)?.get(name)
    }

    /// Set an attribute of `guid`.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, `UnknownAttribute`, `AttributeKind` or `ReadOnlyAttribute`.
    pub fn set(&self, guid: Guid, name: &str, value: impl Into<AttrValue>) -> ControllerResult<()> {
        self.get_resource(guid)?.set(name, value.into())
    }

    /// Lifecycle state of `guid`.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn resource_state(&self, guid: Guid) -> ControllerResult<ResourceState> {
        Ok(self.get_resource(guid)?.state())
    }

    /// Connect two resources, both ways.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn register_connection(&self, a: Guid, b: Guid) -> ControllerResult<()> {
        let first = self.get_resource(a)?;
        let second = self.get_resource(b)?;
        first.register_connection(b);
        second.register_connection(a);
        Ok(())
    }

    /// Gate `action` on every resource in `guids` until every resource in
    /// `wait_guids` reaches `state`, plus `delay`.
    ///
    /// Every condition is validated before any is registered.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `ConditionConflict` for self-dependencies,
    /// `FAILED` targets and mutual waits on the same action.
    pub fn register_condition(
        &self,
        guids: &[Guid],
        action: ResourceAction,
        wait_guids: &[Guid],
        state: ResourceState,
        delay: Option<Duration>,
    ) -> ControllerResult<()> {
        self.check_known(guids)?;
        self.check_known(wait_guids)?;

        let mut pending = Vec::with_capacity(guids.len());
        for &owner in guids {
            let condition = Condition::new(owner, action, wait_guids, state, delay)?;
            for &other_owner in &condition.wait_guids {
                let other = self.get_resource(other_owner)?;
                let clash = other
                    .core()
                    .conditions(Some(action))
                    .iter()
                    .chain(pending.iter().filter(|(o, _)| *o == other_owner).map(|(_, c)| c))
                    .any(|existing| condition.deadlocks_with(owner, existing, other_owner));
                if clash {
                    return Err(ControllerError::ConditionConflict(format!(
                        "{owner} and {other_owner} would wait on each other to {action}"
                    )));
                }
            }
            pending.push((owner, condition));
        }

        for (owner, condition) in pending {
            self.get_resource(owner)?.register_condition(
                condition.action,
                &condition.wait_guids,
                condition.state,
                condition.delay,
            )?;
        }
        Ok(())
    }

    /// Enable a trace on `guid`.
    ///
    /// # Errors
    ///
    /// `UnknownResource` or `UnknownTrace`.
    pub fn enable_trace(&self, guid: Guid, name: &str) -> ControllerResult<()> {
        self.get_resource(guid)?.enable_trace(name)
    }

    /// Read an enabled trace of `guid`.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `Resource` if the trace cannot be read.
    pub fn trace(
        &self,
        guid: Guid,
        name: &str,
        attr: TraceAttr,
        block: usize,
        offset: usize,
    ) -> ControllerResult<String> {
        self.get_resource(guid)?
            .trace(name, attr, block, offset)
            .map_err(|err| resource_error(guid, "trace", &err))
    }

    /// Traces declared by `guid`'s type.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn get_traces(&self, guid: Guid) -> ControllerResult<Vec<String>> {
        Ok(self.get_resource(guid)?.get_traces())
    }

    /// Discover `guid` now, on the calling thread.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `Resource` if the hook failed.
    pub fn discover(&self, guid: Guid) -> ControllerResult<()> {
        self.run_lifecycle(guid, "discover", |rm| rm.discover())
    }

    /// Provision `guid` now, on the calling thread.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `Resource` if the hook failed.
    pub fn provision(&self, guid: Guid) -> ControllerResult<()> {
        self.run_lifecycle(guid, "provision", |rm| rm.provision())
    }

    /// Start `guid` now, ignoring its conditions.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `Resource` if it cannot start.
    pub fn start(&self, guid: Guid) -> ControllerResult<()> {
        self.run_lifecycle(guid, "start", |rm| rm.start())
    }

    /// Stop `guid` now, ignoring its conditions.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `Resource` if the hook failed.
    pub fn stop(&self, guid: Guid) -> ControllerResult<()> {
        self.run_lifecycle(guid, "stop", |rm| rm.stop())
    }

    fn run_lifecycle(
        &self,
        guid: Guid,
        action: &'static str,
        op: impl FnOnce(&dyn ResourceManager) -> AppResult<()>,
    ) -> ControllerResult<()> {
        let rm = self.get_resource(guid)?;
        op(rm.as_ref()).map_err(|err| resource_error(guid, action, &err))
    }

    // -- scheduling -----------------------------------------------------

    /// Run `callback` on the worker pool after `delay`, clamped to
    /// [`MAX_DELAY`](crate::util::MAX_DELAY).
    ///
    /// With `track`, the task's status and result stay queryable through
    /// [`get_task`](Self::get_task) until forgotten or, once finished, until
    /// the tracked-task TTL expires.
    pub fn schedule<F, T>(&self, delay: Duration, callback: F, track: bool) -> TaskId
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Serialize,
    {
        self.schedule_due(saturating_deadline(delay), callback, track)
    }

    fn schedule_due<F, T>(&self, due: Instant, callback: F, track: bool) -> TaskId
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Serialize,
    {
        let task = Task::new(due, callback);
        let record = track.then(|| task.record());
        let id = self.dispatcher.schedule(task);
        let mut tasks = self.tasks.lock();
        self.evict_expired(&mut tasks);
        if let Some(record) = record {
            tasks.insert(id, record);
        }
        id
    }

    /// Like [`schedule`](Self::schedule), with a relative date such as
    /// `"500ms"`, `"1.5s"`, `"2m"` or `"1h"`.
    ///
    /// # Errors
    ///
    /// `InvalidDate` if `date` cannot be parsed or lies beyond the clock's
    /// range; nothing is scheduled.
    pub fn schedule_at<F, T>(&self, date: &str, callback: F, track: bool) -> ControllerResult<TaskId>
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Serialize,
    {
        let due = deadline(parse_delay(date)?)
            .ok_or_else(|| ControllerError::InvalidDate(date.to_string()))?;
        Ok(self.schedule_due(due, callback, track))
    }

    /// Cancel a task that has not been dispatched yet.
    pub fn cancel(&self, id: TaskId) -> bool {
        let cancelled = self.dispatcher.cancel(id);
        if cancelled {
            self.tasks.lock().remove(&id);
            debug!(task_id = id, "task cancelled");
        }
        cancelled
    }

    /// Status and result of a tracked task.
    ///
    /// # Errors
    ///
    /// `UnknownTask` if it was never tracked, was forgotten or has expired.
    pub fn get_task(&self, id: TaskId) -> ControllerResult<TaskSnapshot> {
        self.tasks
            .lock()
            .get(&id)
            .map(|record| snapshot_of(id, record))
            .ok_or(ControllerError::UnknownTask(id))
    }

    /// Stop tracking a task, returning its last snapshot.
    pub fn forget_task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks
            .lock()
            .remove(&id)
            .map(|record| snapshot_of(id, &record))
    }

    fn evict_expired(&self, tasks: &mut HashMap<TaskId, SharedRecord>) {
        let ttl = self.config.task_ttl();
        let before = tasks.len();
        tasks.retain(|_, record| {
            let record = record.lock();
            !(record.status.is_terminal() && record.finished_at.is_some_and(|at| at.elapsed() >= ttl))
        });
        let evicted = before - tasks.len();
        if evicted > 0 {
            debug!(evicted = evicted, "evicted expired tracked tasks");
        }
    }

    /// Schedule `action` on `guid` through its condition-checking entry point.
    pub fn schedule_action(&self, delay: Duration, guid: Guid, action: ResourceAction) -> TaskId {
        let handle = self.handle.clone();
        self.schedule(
            delay,
            move || -> AppResult<()> {
                let rm = handle.controller()?.get_resource(guid)?;
                match action {
                    ResourceAction::Deploy => rm.deploy_with_conditions(),
                    ResourceAction::Start => rm.start_with_conditions(),
                    ResourceAction::Stop => rm.stop_with_conditions(),
                }
            },
            false,
        )
    }

    fn schedule_release(&self, guid: Guid) -> TaskId {
        let handle = self.handle.clone();
        self.schedule(
            Duration::ZERO,
            move || -> AppResult<()> { handle.controller()?.get_resource(guid)?.release() },
            false,
        )
    }

    // -- persistence ------------------------------------------------------

    /// Capture the experiment as it is now.
    #[must_use]
    pub fn snapshot(&self) -> ExperimentSnapshot {
        let resources = self
            .resources
            .read()
            .values()
            .map(|rm| {
                let core = rm.core();
                ResourceSnapshot {
                    guid: core.guid(),
                    rtype: core.rtype().to_string(),
                    state: core.state(),
                    attributes: core.attributes().values(),
                    connections: core.connections(),
                    conditions: core.conditions(None),
                    group: core.deployment_group(),
                    traces: core.enabled_traces(),
                }
            })
            .collect();

        ExperimentSnapshot {
            exp_id: self.exp_id.clone(),
            run_id: self.run_id.clone(),
            state: self.state(),
            failure_level: self.failure_level(),
            groups: self.groups.lock().clone(),
            resources,
            taken_at_ms: now_ms(),
        }
    }

    /// Save a snapshot into the run directory.
    ///
    /// # Errors
    ///
    /// Directory creation or serializer failures.
    pub fn save(&self, format: SerializeFormat) -> ControllerResult<PathBuf> {
        let dir = self.run_dir()?;
        self.serializer.save(&self.snapshot(), &dir, format)
    }

    fn stop_loop(&self) {
        self.dispatcher.request_stop();
        let Some(worker) = self.loop_thread.lock().take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            warn!("controller stopped from its own scheduling loop, detaching it");
            return;
        }
        if worker.join().is_err() {
            warn!("scheduling loop panicked while stopping");
        }
    }
}

fn resource_error(guid: Guid, action: &'static str, err: &anyhow::Error) -> ControllerError {
    ControllerError::Resource {
        guid,
        action,
        reason: format!("{err:#}"),
    }
}

impl fmt::Debug for ExperimentController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentController")
            .field("exp_id", &self.exp_id)
            .field("run_id", &self.run_id)
            .field("state", &self.state())
            .field("failure_level", &self.failure_level())
            .field("resources", &self.resources.read().len())
            .finish_non_exhaustive()
    }
}

impl Drop for ExperimentController {
    fn drop(&mut self) {
        self.stop_loop();
        self.dispatcher.pool().destroy();
        debug!(exp_id = %self.exp_id, "experiment controller dropped");
    }
}
