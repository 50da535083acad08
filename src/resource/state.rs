//! Resource lifecycle states and the actions conditions can gate.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a resource manager.
///
/// The pipeline states are totally ordered
/// `New < Discovered < Provisioned < Ready < Started < Stopped < Released`.
/// `Failed` sits outside that order: it compares equal to itself and is
/// unordered against everything else, so `failed >= Ready` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceState {
    /// Registered, nothing done yet.
    New,
    /// Matching physical resource found.
    Discovered,
    /// Resource provisioned.
    Provisioned,
    /// Deployed and ready to start.
    Ready,
    /// Running.
    Started,
    /// Stopped after running.
    Stopped,
    /// Released; no further transitions.
    Released,
    /// Terminal failure sentinel.
    Failed,
}

impl ResourceState {
    /// Every pipeline state, in order.
    pub const PIPELINE: [Self; 7] = [
        Self::New,
        Self::Discovered,
        Self::Provisioned,
        Self::Ready,
        Self::Started,
        Self::Stopped,
        Self::Released,
    ];

    const fn rank(self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::Discovered => Some(1),
            Self::Provisioned => Some(2),
            Self::Ready => Some(3),
            Self::Started => Some(4),
            Self::Stopped => Some(5),
            Self::Released => Some(6),
            Self::Failed => None,
        }
    }

    /// True if this state is `target` or later in the pipeline.
    #[must_use]
    pub fn reached(self, target: Self) -> bool {
        self >= target
    }

    /// True for the failure sentinel.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl PartialOrd for ResourceState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Discovered => "DISCOVERED",
            Self::Provisioned => "PROVISIONED",
            Self::Ready => "READY",
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Released => "RELEASED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Lifecycle action a condition can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    /// `deploy_with_conditions`.
    Deploy,
    /// `start_with_conditions`.
    Start,
    /// `stop_with_conditions`.
    Stop,
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deploy => "deploy",
            Self::Start => "start",
            Self::Stop => "stop",
        })
    }
}
