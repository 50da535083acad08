//! The resource manager capability and the state every implementation shares.
//!
//! Concrete resource managers (hosts, applications, links) implement
//! [`ResourceManager`] by exposing a [`ResourceCore`] and overriding the `do_*`
//! hooks they need. The provided methods drive the lifecycle: they run the
//! hooks, move the state forward, trap hook errors into `FAILED`, and
//! reschedule gated actions until their conditions hold.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::core::{AppResult, ControllerError, ControllerHandle, ControllerResult, ControllerState};
use crate::resource::{
    AttrValue, Attribute, AttributeSet, Condition, ResourceAction, ResourceState,
};
use crate::util::{GroupId, Guid};

/// Which part of a trace to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceAttr {
    /// Entire content.
    All,
    /// `block` bytes starting at block `offset`.
    Stream,
    /// Location of the trace.
    Path,
    /// Size in bytes.
    Size,
}

/// State shared by every resource manager implementation.
pub struct ResourceCore {
    guid: Guid,
    rtype: String,
    state: RwLock<ResourceState>,
    reached_at: Mutex<HashMap<ResourceState, Instant>>,
    attributes: AttributeSet,
    declared_traces: BTreeSet<String>,
    enabled_traces: RwLock<BTreeSet<String>>,
    connections: RwLock<BTreeSet<Guid>>,
    conditions: RwLock<Vec<Condition>>,
    group: RwLock<Option<GroupId>>,
    lifecycle: ReentrantMutex<()>,
    controller: ControllerHandle,
}

impl ResourceCore {
    pub(crate) fn new(
        guid: Guid,
        rtype: &str,
        schema: &[Attribute],
        traces: &[String],
        controller: ControllerHandle,
    ) -> Self {
        let mut reached_at = HashMap::new();
        reached_at.insert(ResourceState::New, Instant::now());
        Self {
            guid,
            rtype: rtype.to_string(),
            state: RwLock::new(ResourceState::New),
            reached_at: Mutex::new(reached_at),
            attributes: AttributeSet::new(rtype, schema),
            declared_traces: traces.iter().cloned().collect(),
            enabled_traces: RwLock::new(BTreeSet::new()),
            connections: RwLock::new(BTreeSet::new()),
            conditions: RwLock::new(Vec::new()),
            group: RwLock::new(None),
            lifecycle: ReentrantMutex::new(()),
            controller,
        }
    }

    /// Resource guid.
    #[must_use]
    pub const fn guid(&self) -> Guid {
        self.guid
    }

    /// Resource type tag.
    #[must_use]
    pub fn rtype(&self) -> &str {
        &self.rtype
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ResourceState {
        *self.state.read()
    }

    /// Move to `state`, remember when, and wake controller waiters.
    pub fn set_state(&self, state: ResourceState) {
        *self.state.write() = state;
        self.reached_at.lock().insert(state, Instant::now());
        debug!(guid = self.guid, rtype = %self.rtype, state = %state, "resource state changed");
        self.controller.notify_state_change();
    }

    /// When the resource last entered `state`.
    #[must_use]
    pub fn reached_at(&self, state: ResourceState) -> Option<Instant> {
        self.reached_at.lock().get(&state).copied()
    }

    /// Handle to the owning controller.
    #[must_use]
    pub const fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    /// Attribute values.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Read an attribute.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute` if the type declares no such attribute.
    pub fn get(&self, name: &str) -> ControllerResult<AttrValue> {
        self.attributes.get(name)
    }

    /// Set an attribute; `EXEC_READ_ONLY` attributes lock once deployed.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute`, `ReadOnlyAttribute` or `AttributeKind`.
    pub fn set(&self, name: &str, value: AttrValue) -> ControllerResult<()> {
        let state = self.state();
        let deployed = state.is_failed() || state.reached(ResourceState::Ready);
        self.attributes.set(name, value, deployed)
    }

    /// Value of the `critical` attribute.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.get("critical").ok().and_then(|v| v.as_bool()).unwrap_or(true)
    }

    /// Value of the `hardRelease` attribute.
    #[must_use]
    pub fn hard_release(&self) -> bool {
        self.get("hardRelease").ok().and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Connected guids.
    #[must_use]
    pub fn connections(&self) -> Vec<Guid> {
        self.connections.read().iter().copied().collect()
    }

    /// Registered conditions, optionally only those gating `action`.
    #[must_use]
    pub fn conditions(&self, action: Option<ResourceAction>) -> Vec<Condition> {
        self.conditions
            .read()
            .iter()
            .filter(|c| action.is_none_or(|a| c.action == a))
            .cloned()
            .collect()
    }

    /// True if any condition gates `action`.
    #[must_use]
    pub fn has_conditions(&self, action: ResourceAction) -> bool {
        self.conditions.read().iter().any(|c| c.action == action)
    }

    /// Deployment group, once deployed.
    #[must_use]
    pub fn deployment_group(&self) -> Option<GroupId> {
        *self.group.read()
    }

    pub(crate) fn set_deployment_group(&self, group: GroupId) {
        *self.group.write() = Some(group);
    }

    /// Traces the resource type declares.
    #[must_use]
    pub fn declared_traces(&self) -> Vec<String> {
        self.declared_traces.iter().cloned().collect()
    }

    /// True if trace `name` has been enabled.
    #[must_use]
    pub fn trace_enabled(&self, name: &str) -> bool {
        self.enabled_traces.read().contains(name)
    }

    /// Enabled traces.
    #[must_use]
    pub fn enabled_traces(&self) -> Vec<String> {
        self.enabled_traces.read().iter().cloned().collect()
    }

    /// Mark the resource `FAILED` and report it to the controller.
    pub fn fail(&self, action: &str, err: &anyhow::Error) {
        error!(
            guid = self.guid,
            rtype = %self.rtype,
            action = action,
            error = %format!("{err:#}"),
            "resource failed"
        );
        self.set_state(ResourceState::Failed);
        self.controller.inform_failure(self.guid);
    }

    /// Time left before the conditions gating `action` hold, or `None` if
    /// they already do.
    ///
    /// # Errors
    ///
    /// Fails if the controller is gone or a waited-on resource was removed.
    pub fn unmet_conditions(&self, action: ResourceAction) -> ControllerResult<Option<Duration>> {
        let conditions = self.conditions(Some(action));
        if conditions.is_empty() {
            return Ok(None);
        }

        let ec = self.controller.controller()?;
        let retry = ec.config().reschedule_delay();
        for cond in &conditions {
            for &guid in &cond.wait_guids {
                let other = ec.get_resource(guid)?;
                let other = other.core();
                if !other.state().reached(cond.state) {
                    return Ok(Some(retry));
                }
                if let Some(delay) = cond.delay {
                    let since = other.reached_at(cond.state).map_or(delay, |t| t.elapsed());
                    if since < delay {
                        return Ok(Some(delay - since));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Try `action` again after `delay`, unless orchestration is winding down.
    ///
    /// # Errors
    ///
    /// Fails if the controller is gone.
    pub fn reschedule(&self, action: ResourceAction, delay: Duration) -> ControllerResult<()> {
        let ec = self.controller.controller()?;
        if ec.abort() || ec.state() != ControllerState::Running {
            debug!(guid = self.guid, action = %action, "controller winding down, not rescheduling");
            return Ok(());
        }
        debug!(
            guid = self.guid,
            action = %action,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "rescheduling"
        );
        ec.schedule_action(delay, self.guid, action);
        Ok(())
    }

    fn retry_delay(&self) -> ControllerResult<Duration> {
        Ok(self.controller.controller()?.config().reschedule_delay())
    }
}

impl fmt::Debug for ResourceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCore")
            .field("guid", &self.guid)
            .field("rtype", &self.rtype)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Run `hook` and move to `target`, or trap its error into `FAILED`.
///
/// The current state is checked against `from` under the lifecycle lock;
/// `FAILED` and `RELEASED` never qualify.
fn transition<R, P, F>(
    rm: &R,
    action: &'static str,
    from: P,
    target: ResourceState,
    hook: F,
) -> AppResult<()>
where
    R: ResourceManager + ?Sized,
    P: FnOnce(ResourceState) -> bool,
    F: FnOnce(&R) -> AppResult<()>,
{
    let core = rm.core();
    let _lifecycle = core.lifecycle.lock();
    let state = core.state();
    if state.is_failed() {
        return Err(anyhow!("resource {} is FAILED, cannot {action}", core.guid()));
    }
    if state == ResourceState::Released || !from(state) {
        return Err(anyhow!("resource {} cannot {action} from {state}", core.guid()));
    }
    match hook(rm) {
        Ok(()) => {
            core.set_state(target);
            Ok(())
        }
        Err(err) => {
            core.fail(action, &err);
            Err(err)
        }
    }
}

/// A controlled entity with an independent lifecycle.
///
/// Implementors provide [`core`](Self::core) and override whichever `do_*`
/// hooks their resource needs; the provided methods must not be overridden
/// casually, the controller relies on their state transitions.
pub trait ResourceManager: Send + Sync + 'static {
    /// Shared resource state.
    fn core(&self) -> &ResourceCore;

    /// Find the physical resource.
    fn do_discover(&self) -> AppResult<()> {
        Ok(())
    }

    /// Provision it.
    fn do_provision(&self) -> AppResult<()> {
        Ok(())
    }

    /// Final deployment step before `READY`.
    fn do_deploy(&self) -> AppResult<()> {
        Ok(())
    }

    /// Start it.
    fn do_start(&self) -> AppResult<()> {
        Ok(())
    }

    /// Stop it.
    fn do_stop(&self) -> AppResult<()> {
        Ok(())
    }

    /// Release everything it holds.
    fn do_release(&self) -> AppResult<()> {
        Ok(())
    }

    /// Read trace `name`.
    fn do_trace(&self, name: &str, attr: TraceAttr, block: usize, offset: usize) -> AppResult<String> {
        let _ = (attr, block, offset);
        Err(anyhow!("resource type `{}` cannot read trace `{name}`", self.rtype()))
    }

    /// Resource guid.
    fn guid(&self) -> Guid {
        self.core().guid()
    }

    /// Resource type tag.
    fn rtype(&self) -> &str {
        self.core().rtype()
    }

    /// Current lifecycle state.
    fn state(&self) -> ResourceState {
        self.core().state()
    }

    /// Read an attribute.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute` if the type declares no such attribute.
    fn get(&self, name: &str) -> ControllerResult<AttrValue> {
        self.core().get(name)
    }

    /// Set an attribute.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute`, `ReadOnlyAttribute` or `AttributeKind`.
    fn set(&self, name: &str, value: AttrValue) -> ControllerResult<()> {
        self.core().set(name, value)
    }

    /// Record a connection to another resource.
    fn register_connection(&self, guid: Guid) {
        self.core().connections.write().insert(guid);
    }

    /// Gate `action` on `wait_guids` reaching `state`, plus `delay`.
    ///
    /// # Errors
    ///
    /// `ConditionConflict` for conditions that can never hold.
    fn register_condition(
        &self,
        action: ResourceAction,
        wait_guids: &[Guid],
        state: ResourceState,
        delay: Option<Duration>,
    ) -> ControllerResult<()> {
        let condition = Condition::new(self.guid(), action, wait_guids, state, delay)?;
        self.core().conditions.write().push(condition);
        Ok(())
    }

    /// Discover the resource; it must be `NEW`.
    ///
    /// # Errors
    ///
    /// Wrong state, or the hook's error (the resource is then `FAILED`).
    fn discover(&self) -> AppResult<()> {
        transition(
            self,
            "discover",
            |state| state == ResourceState::New,
            ResourceState::Discovered,
            |rm| rm.do_discover(),
        )
    }

    /// Provision the resource; it must be `NEW` or `DISCOVERED`.
    ///
    /// # Errors
    ///
    /// Wrong state, or the hook's error (the resource is then `FAILED`).
    fn provision(&self) -> AppResult<()> {
        transition(
            self,
            "provision",
            |state| !state.reached(ResourceState::Provisioned),
            ResourceState::Provisioned,
            |rm| rm.do_provision(),
        )
    }

    /// Discover and provision as needed, then deploy to `READY`.
    ///
    /// # Errors
    ///
    /// The first failing hook's error; the resource is then `FAILED`.
    fn deploy(&self) -> AppResult<()> {
        let core = self.core();
        let _lifecycle = core.lifecycle.lock();
        let state = core.state();
        if state.reached(ResourceState::Ready) {
            return Ok(());
        }
        if !state.reached(ResourceState::Discovered) {
            self.discover()?;
        }
        if !core.state().reached(ResourceState::Provisioned) {
            self.provision()?;
        }
        transition(
            self,
            "deploy",
            |state| state == ResourceState::Provisioned,
            ResourceState::Ready,
            |rm| rm.do_deploy(),
        )
    }

    /// Start the resource; it must be `READY` or `STOPPED`.
    ///
    /// # Errors
    ///
    /// Wrong state, or the hook's error (the resource is then `FAILED`).
    fn start(&self) -> AppResult<()> {
        transition(
            self,
            "start",
            |state| matches!(state, ResourceState::Ready | ResourceState::Stopped),
            ResourceState::Started,
            |rm| rm.do_start(),
        )
    }

    /// Stop the resource; a no-op unless it is `STARTED`.
    ///
    /// # Errors
    ///
    /// The hook's error; the resource is then `FAILED`.
    fn stop(&self) -> AppResult<()> {
        let _lifecycle = self.core().lifecycle.lock();
        if self.state() != ResourceState::Started {
            return Ok(());
        }
        transition(
            self,
            "stop",
            |state| state == ResourceState::Started,
            ResourceState::Stopped,
            |rm| rm.do_stop(),
        )
    }

    /// Release the resource. Always ends in `RELEASED`; a failing hook is logged.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other lifecycle operations.
    fn release(&self) -> AppResult<()> {
        let core = self.core();
        let _lifecycle = core.lifecycle.lock();
        if core.state() == ResourceState::Released {
            return Ok(());
        }
        if let Err(err) = self.do_release() {
            warn!(
                guid = core.guid(),
                error = %format!("{err:#}"),
                "release failed, marking resource released anyway"
            );
        }
        core.set_state(ResourceState::Released);
        Ok(())
    }

    /// Deploy once every deploy condition holds, rescheduling until then.
    ///
    /// # Errors
    ///
    /// Controller gone, or the deploy error.
    fn deploy_with_conditions(&self) -> AppResult<()> {
        let core = self.core();
        let state = core.state();
        if state.is_failed() || state.reached(ResourceState::Ready) {
            return Ok(());
        }
        match core.unmet_conditions(ResourceAction::Deploy)? {
            Some(delay) => Ok(core.reschedule(ResourceAction::Deploy, delay)?),
            None => self.deploy(),
        }
    }

    /// Start once `READY`/`STOPPED` and every start condition holds.
    ///
    /// # Errors
    ///
    /// Controller gone, or the start error.
    fn start_with_conditions(&self) -> AppResult<()> {
        let core = self.core();
        let state = core.state();
        if state.is_failed() || state == ResourceState::Started || state.reached(ResourceState::Released) {
            return Ok(());
        }
        if !matches!(state, ResourceState::Ready | ResourceState::Stopped) {
            return Ok(core.reschedule(ResourceAction::Start, core.retry_delay()?)?);
        }
        match core.unmet_conditions(ResourceAction::Start)? {
            Some(delay) => Ok(core.reschedule(ResourceAction::Start, delay)?),
            None => self.start(),
        }
    }

    /// Stop once `STARTED` and every stop condition holds.
    ///
    /// # Errors
    ///
    /// Controller gone, or the stop error.
    fn stop_with_conditions(&self) -> AppResult<()> {
        let core = self.core();
        let state = core.state();
        if state.is_failed() || state.reached(ResourceState::Stopped) {
            return Ok(());
        }
        if state != ResourceState::Started {
            return Ok(core.reschedule(ResourceAction::Stop, core.retry_delay()?)?);
        }
        match core.unmet_conditions(ResourceAction::Stop)? {
            Some(delay) => Ok(core.reschedule(ResourceAction::Stop, delay)?),
            None => self.stop(),
        }
    }

    /// Enable a declared trace.
    ///
    /// # Errors
    ///
    /// `UnknownTrace` if the type declares no such trace.
    fn enable_trace(&self, name: &str) -> ControllerResult<()> {
        let core = self.core();
        if !core.declared_traces.contains(name) {
            return Err(ControllerError::UnknownTrace {
                guid: core.guid(),
                name: name.to_string(),
            });
        }
        core.enabled_traces.write().insert(name.to_string());
        Ok(())
    }

    /// Read an enabled trace.
    ///
    /// # Errors
    ///
    /// Trace not enabled, or the hook's error.
    fn trace(&self, name: &str, attr: TraceAttr, block: usize, offset: usize) -> AppResult<String> {
        if !self.core().trace_enabled(name) {
            return Err(anyhow!("trace `{name}` is not enabled on resource {}", self.guid()));
        }
        self.do_trace(name, attr, block, offset)
    }

    /// Traces the resource type declares.
    fn get_traces(&self) -> Vec<String> {
        self.core().declared_traces()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::resource::{standard_attributes, AttrKind, Flags};

    struct Probe {
        core: ResourceCore,
        hooks: AtomicUsize,
        fail_provision: bool,
        fail_release: bool,
    }

    impl Probe {
        fn new(fail_provision: bool, fail_release: bool) -> Self {
            let mut schema = standard_attributes();
            schema.push(Attribute::new("image", AttrKind::Str).with_flags(Flags::EXEC_READ_ONLY));
            Self {
                core: ResourceCore::new(
                    1,
                    "probe",
                    &schema,
                    &["stdout".to_string()],
                    ControllerHandle::detached(),
                ),
                hooks: AtomicUsize::new(0),
                fail_provision,
                fail_release,
            }
        }
    }

    impl ResourceManager for Probe {
        fn core(&self) -> &ResourceCore {
            &self.core
        }

        fn do_discover(&self) -> AppResult<()> {
            self.hooks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn do_provision(&self) -> AppResult<()> {
            self.hooks.fetch_add(1, Ordering::SeqCst);
            if self.fail_provision {
                return Err(anyhow!("no capacity"));
            }
            Ok(())
        }

        fn do_release(&self) -> AppResult<()> {
            if self.fail_release {
                return Err(anyhow!("already gone"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_deploy_walks_the_pipeline() {
        let rm = Probe::new(false, false);
        rm.deploy().unwrap();
        assert_eq!(rm.state(), ResourceState::Ready);
        assert_eq!(rm.hooks.load(Ordering::SeqCst), 2);
        assert!(rm.core().reached_at(ResourceState::Provisioned).is_some());

        rm.deploy().unwrap();
        assert_eq!(rm.hooks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hook_error_fails_resource() {
        let rm = Probe::new(true, false);
        assert!(rm.deploy().is_err());
        assert_eq!(rm.state(), ResourceState::Failed);
        assert!(rm.start().is_err());
        assert!(rm.deploy_with_conditions().is_ok());
        assert_eq!(rm.state(), ResourceState::Failed);
    }

    #[test]
    fn test_start_and_stop_guard_states() {
        let rm = Probe::new(false, false);
        assert!(rm.start().is_err());
        assert_eq!(rm.state(), ResourceState::New);

        rm.stop().unwrap();
        assert_eq!(rm.state(), ResourceState::New);

        rm.deploy().unwrap();
        rm.start().unwrap();
        rm.stop().unwrap();
        assert_eq!(rm.state(), ResourceState::Stopped);
        rm.start().unwrap();
        assert_eq!(rm.state(), ResourceState::Started);
    }

    #[test]
    fn test_release_always_ends_released() {
        let rm = Probe::new(false, true);
        rm.release().unwrap();
        assert_eq!(rm.state(), ResourceState::Released);
    }

    #[test]
    fn test_exec_read_only_locks_once_ready() {
        let rm = Probe::new(false, false);
        rm.set("image", AttrValue::from("debian")).unwrap();
        rm.deploy().unwrap();
        assert!(matches!(
            rm.set("image", AttrValue::from("alpine")),
            Err(ControllerError::ReadOnlyAttribute(_))
        ));
        assert_eq!(rm.get("image").unwrap(), AttrValue::from("debian"));
    }

    #[test]
    fn test_traces_must_be_declared_and_enabled() {
        let rm = Probe::new(false, false);
        assert!(rm.enable_trace("stderr").is_err());
        assert!(rm.trace("stdout", TraceAttr::All, 0, 0).is_err());
        rm.enable_trace("stdout").unwrap();
        assert!(rm.core().trace_enabled("stdout"));
        assert!(rm.trace("stdout", TraceAttr::All, 0, 0).is_err());
    }

    #[test]
    fn test_conditions_are_recorded() {
        let rm = Probe::new(false, false);
        rm.register_condition(ResourceAction::Start, &[3, 2], ResourceState::Ready, None)
            .unwrap();
        assert!(rm.core().has_conditions(ResourceAction::Start));
        assert!(!rm.core().has_conditions(ResourceAction::Stop));
        assert_eq!(rm.core().conditions(Some(ResourceAction::Start))[0].wait_guids, vec![2, 3]);
        assert!(matches!(
            rm.core().unmet_conditions(ResourceAction::Start),
            Err(ControllerError::ControllerGone)
        ));
    }

    #[test]
    fn test_released_is_terminal() {
        let rm = Probe::new(false, false);
        rm.release().unwrap();

        assert!(rm.discover().is_err());
        assert!(rm.provision().is_err());
        assert!(rm.start().is_err());
        rm.deploy().unwrap();
        rm.stop().unwrap();
        assert_eq!(rm.state(), ResourceState::Released);
        assert_eq!(rm.hooks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_discover_only_from_new() {
        let rm = Probe::new(false, false);
        rm.deploy().unwrap();
        assert!(rm.discover().is_err());
        assert!(rm.provision().is_err());
        assert_eq!(rm.state(), ResourceState::Ready);
    }

    struct SlowStart {
        core: ResourceCore,
        entered: crossbeam_channel::Sender<()>,
        proceed: crossbeam_channel::Receiver<()>,
    }

    impl ResourceManager for SlowStart {
        fn core(&self) -> &ResourceCore {
            &self.core
        }

        fn do_start(&self) -> AppResult<()> {
            self.entered.send(())?;
            self.proceed.recv()?;
            Ok(())
        }
    }

    #[test]
    fn test_release_waits_for_in_flight_start() {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (proceed_tx, proceed_rx) = crossbeam_channel::bounded(1);
        let rm = std::sync::Arc::new(SlowStart {
            core: ResourceCore::new(
                1,
                "slow",
                &standard_attributes(),
                &[],
                ControllerHandle::detached(),
            ),
            entered: entered_tx,
            proceed: proceed_rx,
        });
        rm.deploy().unwrap();

        let starter = {
            let rm = std::sync::Arc::clone(&rm);
            std::thread::spawn(move || rm.start())
        };
        entered_rx.recv().unwrap();
        let releaser = {
            let rm = std::sync::Arc::clone(&rm);
            std::thread::spawn(move || rm.release())
        };
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(rm.state(), ResourceState::Ready);

        proceed_tx.send(()).unwrap();
        starter.join().unwrap().unwrap();
        releaser.join().unwrap().unwrap();
        assert_eq!(rm.state(), ResourceState::Released);
        assert!(rm.start().is_err());
        assert_eq!(rm.state(), ResourceState::Released);
    }
}
