//! Error types for controller operations.

use thiserror::Error;

use crate::core::worker_pool::PoolError;
use crate::core::ControllerState;
use crate::resource::AttrKind;
use crate::util::{Guid, TaskId};

/// Errors produced synchronously by controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// No resource manager is registered under this guid.
    #[error("unknown resource guid {0}")]
    UnknownResource(Guid),
    /// No resource type is registered under this name.
    #[error("unknown resource type `{0}`")]
    UnknownResourceType(String),
    /// A resource type with this name already exists.
    #[error("resource type `{0}` is already registered")]
    DuplicateResourceType(String),
    /// The resource type declares no attribute with this name.
    #[error("resource type `{rtype}` has no attribute `{name}`")]
    UnknownAttribute {
        /// Resource type tag.
        rtype: String,
        /// Attribute name.
        name: String,
    },
    /// The value does not match the attribute's declared kind.
    #[error("attribute `{name}` expects {expected}, got {found}")]
    AttributeKind {
        /// Attribute name.
        name: String,
        /// Declared kind.
        expected: AttrKind,
        /// Kind of the rejected value.
        found: AttrKind,
    },
    /// The attribute cannot be set in the resource's current state.
    #[error("attribute `{0}` is read-only")]
    ReadOnlyAttribute(String),
    /// The resource type declares no trace with this name.
    #[error("resource {guid} has no trace `{name}`")]
    UnknownTrace {
        /// Resource guid.
        guid: Guid,
        /// Trace name.
        name: String,
    },
    /// A scheduling date could not be parsed.
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    /// A condition registration contradicts itself or an existing condition.
    #[error("conflicting condition: {0}")]
    ConditionConflict(String),
    /// The scheduling loop failed; orchestration cannot continue.
    #[error("controller has failed")]
    ControllerFailed,
    /// The operation needs a running controller.
    #[error("controller is not running (state {0})")]
    NotRunning(ControllerState),
    /// The controller behind a handle has been dropped.
    #[error("controller is no longer alive")]
    ControllerGone,
    /// No tracked task exists under this id.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
    /// A resource lifecycle operation failed.
    #[error("resource {guid} failed to {action}: {reason}")]
    Resource {
        /// Resource guid.
        guid: Guid,
        /// Lifecycle operation name.
        action: &'static str,
        /// Formatted error chain.
        reason: String,
    },
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Worker pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type of synchronous controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Application-facing result using anyhow for task callbacks and resource hooks.
pub type AppResult<T> = Result<T, anyhow::Error>;
