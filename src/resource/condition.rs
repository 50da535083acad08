//! Declarative gates binding a resource action to other resources' states.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ControllerError, ControllerResult};
use crate::resource::{ResourceAction, ResourceState};
use crate::util::Guid;

/// `action` on the owning resource may only run once every guid in
/// `wait_guids` has reached `state`, and `delay` has elapsed since it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Gated action.
    pub action: ResourceAction,
    /// Resources waited on.
    pub wait_guids: Vec<Guid>,
    /// State they must reach.
    pub state: ResourceState,
    /// Extra time after they reached it.
    pub delay: Option<Duration>,
}

impl Condition {
    /// Build a condition, rejecting ones that can never be satisfied.
    ///
    /// # Errors
    ///
    /// `ConditionConflict` if `owner` waits on itself, on nothing, or on `FAILED`.
    pub fn new(
        owner: Guid,
        action: ResourceAction,
        wait_guids: &[Guid],
        state: ResourceState,
        delay: Option<Duration>,
    ) -> ControllerResult<Self> {
        if wait_guids.is_empty() {
            return Err(ControllerError::ConditionConflict(format!(
                "{action} condition on {owner} waits on no resource"
            )));
        }
        if wait_guids.contains(&owner) {
            return Err(ControllerError::ConditionConflict(format!(
                "resource {owner} cannot gate its own {action}"
            )));
        }
        if state.is_failed() {
            return Err(ControllerError::ConditionConflict(format!(
                "{action} condition on {owner} waits for {state}, which is not a pipeline state"
            )));
        }

        let mut wait_guids = wait_guids.to_vec();
        wait_guids.sort_unstable();
        wait_guids.dedup();

        Ok(Self {
            action,
            wait_guids,
            state,
            delay,
        })
    }

    /// True if this condition makes its owner wait on `guid`.
    #[must_use]
    pub fn waits_on(&self, guid: Guid) -> bool {
        self.wait_guids.binary_search(&guid).is_ok()
    }

    /// True if the awaited state is only reachable by performing the gated
    /// action itself.
    #[must_use]
    pub fn awaits_own_action(&self) -> bool {
        match self.action {
            ResourceAction::Deploy => self.state > ResourceState::New,
            ResourceAction::Start => self.state.reached(ResourceState::Started),
            ResourceAction::Stop => self.state.reached(ResourceState::Stopped),
        }
    }

    /// True if `self` (owned by `owner`) and `other` (owned by `other_owner`)
    /// wait on each other for the same action, so neither can ever proceed.
    #[must_use]
    pub fn deadlocks_with(&self, owner: Guid, other: &Self, other_owner: Guid) -> bool {
        self.action == other.action
            && self.waits_on(other_owner)
            && other.waits_on(owner)
            && self.awaits_own_action()
            && other.awaits_own_action()
    }
}
