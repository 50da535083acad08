//! Experiment snapshots and the backends that persist them.

pub mod json;
pub mod memory;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{ControllerResult, ControllerState, FailureLevel};
use crate::resource::{AttrValue, Condition, ResourceState};
use crate::util::{GroupId, Guid};

pub use json::JsonSerializer;
pub use memory::InMemorySerializer;

/// Output encoding requested from a serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializeFormat {
    /// Indented JSON.
    #[default]
    Json,
    /// Single-line JSON.
    JsonCompact,
}

/// Point-in-time description of one resource manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Resource guid.
    pub guid: Guid,
    /// Resource type tag.
    pub rtype: String,
    /// Lifecycle state.
    pub state: ResourceState,
    /// Attribute values, credentials excluded.
    pub attributes: BTreeMap<String, AttrValue>,
    /// Connected guids.
    pub connections: Vec<Guid>,
    /// Registered conditions.
    pub conditions: Vec<Condition>,
    /// Deployment group, once deployed.
    pub group: Option<GroupId>,
    /// Enabled traces.
    pub traces: Vec<String>,
}

/// Point-in-time description of a whole experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSnapshot {
    /// Experiment id.
    pub exp_id: String,
    /// Run id.
    pub run_id: String,
    /// Controller state.
    pub state: ControllerState,
    /// Failure level.
    pub failure_level: FailureLevel,
    /// Deployment groups and their members.
    pub groups: BTreeMap<GroupId, Vec<Guid>>,
    /// Every registered resource, by guid.
    pub resources: Vec<ResourceSnapshot>,
    /// Wall clock time of the snapshot, in ms since the epoch.
    pub taken_at_ms: u128,
}

/// Persists experiment snapshots.
pub trait Serializer: Send + Sync {
    /// Write `snapshot` under `dir` and return the path written.
    ///
    /// # Errors
    ///
    /// I/O or encoding failures.
    fn save(
        &self,
        snapshot: &ExperimentSnapshot,
        dir: &Path,
        format: SerializeFormat,
    ) -> ControllerResult<PathBuf>;
}
