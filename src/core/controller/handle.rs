use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::{ControllerError, ControllerResult, ExperimentController};
use crate::util::Guid;

/// Non-owning reference to an [`ExperimentController`].
///
/// Resource managers, the failure manager, the scheduling loop and scheduled
/// callbacks all reach the controller through a handle; none of them keeps it
/// alive.
#[derive(Clone, Default)]
pub struct ControllerHandle {
    inner: Weak<ExperimentController>,
}

impl ControllerHandle {
    pub(crate) const fn new(inner: Weak<ExperimentController>) -> Self {
        Self { inner }
    }

    /// A handle that never resolves.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Resolve the handle.
    ///
    /// # Errors
    ///
    /// `ControllerGone` once the controller has been dropped.
    pub fn controller(&self) -> ControllerResult<Arc<ExperimentController>> {
        self.inner.upgrade().ok_or(ControllerError::ControllerGone)
    }

    /// True while the controller is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub(crate) fn notify_state_change(&self) {
        if let Some(ec) = self.inner.upgrade() {
            ec.signal().notify();
        }
    }

    pub(crate) fn inform_failure(&self, guid: Guid) {
        if let Some(ec) = self.inner.upgrade() {
            ec.inform_failure(guid);
        }
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
