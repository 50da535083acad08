//! Deployment groups and the readiness barrier.

use std::time::Duration;

use tracing::{debug, info};

use crate::core::{
    AppResult, ControllerError, ControllerResult, ControllerState, ExperimentController,
};
use crate::resource::{ResourceAction, ResourceState};
use crate::util::{GroupId, Guid};

impl ExperimentController {
    /// Deploy `guids` (default: every resource still `NEW`) as part of
    /// `group` (default: a new group) and return the group id.
    ///
    /// With `wait_all_ready`, a newly created group gets a barrier task that
    /// starts its members only once every one of them is `READY`. Without it,
    /// every resource is started as soon as its own conditions allow.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or `NotRunning` once the controller left `RUNNING`.
    pub fn deploy(
        &self,
        guids: Option<&[Guid]>,
        wait_all_ready: bool,
        group: Option<GroupId>,
    ) -> ControllerResult<GroupId> {
        let state = self.state();
        if state != ControllerState::Running {
            return Err(ControllerError::NotRunning(state));
        }

        let guids = match guids {
            Some(guids) => {
                self.check_known(guids)?;
                guids.to_vec()
            }
            None => self.resources_where(|rm| rm.state() == ResourceState::New),
        };

        let (group, created) = {
            let mut groups = self.groups.lock();
            let (id, created) = match group {
                Some(id) => (id, !groups.contains_key(&id)),
                None => loop {
                    let id = self.group_ids.next_id();
                    if !groups.contains_key(&id) {
                        break (id, true);
                    }
                },
            };
            let members = groups.entry(id).or_default();
            for guid in &guids {
                if !members.contains(guid) {
                    members.push(*guid);
                }
            }
            (id, created)
        };

        if wait_all_ready && created {
            self.schedule_barrier(group, Duration::ZERO);
        }

        for &guid in &guids {
            self.get_resource(guid)?.core().set_deployment_group(group);
            self.schedule_action(Duration::ZERO, guid, ResourceAction::Deploy);
            if !wait_all_ready {
                self.schedule_start(guid)?;
            }
        }

        info!(
            group = group,
            resources = guids.len(),
            wait_all_ready = wait_all_ready,
            "deployment scheduled"
        );
        Ok(group)
    }

    /// Members of a deployment group.
    #[must_use]
    pub fn deployment_group(&self, group: GroupId) -> Option<Vec<Guid>> {
        self.groups.lock().get(&group).cloned()
    }

    /// Every deployment group id.
    #[must_use]
    pub fn deployment_groups(&self) -> Vec<GroupId> {
        self.groups.lock().keys().copied().collect()
    }

    /// Schedule `start_with_conditions` on `guid`, plus `stop_with_conditions`
    /// if it has stop conditions.
    fn schedule_start(&self, guid: Guid) -> ControllerResult<()> {
        let has_stop = self.get_resource(guid)?.core().has_conditions(ResourceAction::Stop);
        self.schedule_action(Duration::ZERO, guid, ResourceAction::Start);
        if has_stop {
            self.schedule_action(Duration::ZERO, guid, ResourceAction::Stop);
        }
        Ok(())
    }

    fn schedule_barrier(&self, group: GroupId, delay: Duration) {
        let handle = self.handle();
        self.schedule(
            delay,
            move || -> AppResult<bool> { Ok(handle.controller()?.barrier(group)?) },
            false,
        );
    }

    /// One readiness check of `group`. Starts every member and returns true
    /// once all of them are `READY`; otherwise checks again after the barrier
    /// interval. A `FAILED` member holds the group until the controller
    /// aborts or winds down.
    pub(crate) fn barrier(&self, group: GroupId) -> ControllerResult<bool> {
        if self.abort() || self.state() != ControllerState::Running {
            debug!(group = group, "barrier dropped, controller winding down");
            return Ok(false);
        }

        let members = self.deployment_group(group).unwrap_or_default();
        let mut startable = Vec::with_capacity(members.len());
        for guid in members {
            let Ok(rm) = self.get_resource(guid) else {
                continue;
            };
            let state = rm.state();
            if !state.reached(ResourceState::Ready) {
                debug!(group = group, guid = guid, state = %state, "deployment group not ready");
                self.schedule_barrier(group, self.config.barrier_interval());
                return Ok(false);
            }
            startable.push(guid);
        }

        for &guid in &startable {
            self.schedule_start(guid)?;
        }
        info!(group = group, started = startable.len(), "deployment group ready");
        Ok(true)
    }
}
