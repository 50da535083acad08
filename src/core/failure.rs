//! Failure level tracking for a running experiment.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::core::ControllerHandle;
use crate::resource::ResourceState;
use crate::util::Guid;

/// How badly the experiment has failed. Only ever increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureLevel {
    /// Nothing critical has failed.
    Ok,
    /// A critical resource failed.
    RmFailure,
    /// The scheduling loop itself failed.
    EcFailure,
}

/// Escalating failure level plus the abort flag.
///
/// Holds only a weak handle to its controller.
#[derive(Debug)]
pub struct FailureManager {
    level: Mutex<FailureLevel>,
    abort: AtomicBool,
    controller: ControllerHandle,
}

impl FailureManager {
    /// New manager at level `Ok`.
    #[must_use]
    pub const fn new(controller: ControllerHandle) -> Self {
        Self {
            level: Mutex::new(FailureLevel::Ok),
            abort: AtomicBool::new(false),
            controller,
        }
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> FailureLevel {
        *self.level.lock()
    }

    /// True once a critical resource failure was reported.
    #[must_use]
    pub fn abort(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Escalate to `RmFailure` and set abort if `guid` is a critical resource
    /// in `FAILED` and nothing has failed before. Returns true on escalation.
    pub fn eval_failure(&self, guid: Guid) -> bool {
        let mut level = self.level.lock();
        if *level != FailureLevel::Ok {
            return false;
        }

        let Ok(ec) = self.controller.controller() else {
            return false;
        };
        let Ok(rm) = ec.get_resource(guid) else {
            warn!(guid = guid, "failure reported for unknown resource");
            return false;
        };
        let core = rm.core();
        if core.state() != ResourceState::Failed || !core.is_critical() {
            return false;
        }

        *level = FailureLevel::RmFailure;
        self.abort.store(true, Ordering::Release);
        error!(guid = guid, rtype = %core.rtype(), "critical resource failed, aborting experiment");
        true
    }

    /// Escalate to `EcFailure`. Does not touch the abort flag.
    pub fn set_ec_failure(&self) {
        let mut level = self.level.lock();
        if *level < FailureLevel::EcFailure {
            *level = FailureLevel::EcFailure;
        }
    }
}
