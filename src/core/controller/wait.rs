//! Blocking wait primitives.

use std::collections::VecDeque;

use tracing::debug;

use crate::core::{ControllerResult, ControllerState, ExperimentController};
use crate::resource::ResourceState;
use crate::util::Guid;

impl ExperimentController {
    /// Block until every resource in `guids` has reached `state`, or until
    /// `quit` returns true. Returns the guids that reached it; on quit the
    /// rest are left out, so callers must check the result.
    ///
    /// Waiters wake on every resource state change and otherwise re-check
    /// once per poll interval. Resources removed while waiting are dropped.
    ///
    /// # Errors
    ///
    /// `UnknownResource` if a guid is not registered when the call starts.
    pub fn wait<Q>(&self, guids: &[Guid], state: ResourceState, quit: Q) -> ControllerResult<Vec<Guid>>
    where
        Q: Fn(&Self) -> bool,
    {
        self.check_known(guids)?;

        let mut pending: VecDeque<Guid> = guids.iter().copied().collect();
        let mut reached = Vec::with_capacity(pending.len());
        let poll = self.config.poll_interval();

        while !pending.is_empty() {
            let seen = self.signal.generation();
            if quit(self) {
                debug!(
                    state = %state,
                    unsatisfied = pending.len(),
                    "wait interrupted"
                );
                break;
            }

            for _ in 0..pending.len() {
                let Some(guid) = pending.pop_front() else {
                    break;
                };
                match self.get_resource(guid) {
                    Ok(rm) if rm.state().reached(state) => reached.push(guid),
                    Ok(_) => pending.push_back(guid),
                    Err(_) => debug!(guid = guid, "resource vanished while waiting"),
                }
            }

            if !pending.is_empty() {
                self.signal.wait_for_change(seen, poll);
            }
        }
        Ok(reached)
    }

    /// Wait for `READY`; gives up on abort.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn wait_deployed(&self, guids: &[Guid]) -> ControllerResult<Vec<Guid>> {
        self.wait(guids, ResourceState::Ready, Self::abort)
    }

    /// Wait for `STARTED`; gives up on abort.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn wait_started(&self, guids: &[Guid]) -> ControllerResult<Vec<Guid>> {
        self.wait(guids, ResourceState::Started, Self::abort)
    }

    /// Wait for `STOPPED`; gives up on abort.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn wait_finished(&self, guids: &[Guid]) -> ControllerResult<Vec<Guid>> {
        self.wait(guids, ResourceState::Stopped, Self::abort)
    }

    /// Wait for `RELEASED`; gives up once the controller has failed.
    ///
    /// # Errors
    ///
    /// `UnknownResource`.
    pub fn wait_released(&self, guids: &[Guid]) -> ControllerResult<Vec<Guid>> {
        self.wait(guids, ResourceState::Released, |ec| {
            ec.state() == ControllerState::Failed
        })
    }
}
