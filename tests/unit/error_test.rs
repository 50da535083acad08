//! Tests for error types

use prometheus_orchestrator::core::{ControllerError, ControllerState, PoolError};
use prometheus_orchestrator::resource::AttrKind;

#[test]
fn test_unknown_resource_error() {
    let err = ControllerError::UnknownResource(7);
    assert_eq!(format!("{err}"), "unknown resource guid 7");
}

#[test]
fn test_attribute_kind_error() {
    let err = ControllerError::AttributeKind {
        name: "port".to_string(),
        expected: AttrKind::Int,
        found: AttrKind::Str,
    };
    assert_eq!(format!("{err}"), "attribute `port` expects int, got string");
}

#[test]
fn test_not_running_error() {
    let err = ControllerError::NotRunning(ControllerState::Terminated);
    assert_eq!(format!("{err}"), "controller is not running (state TERMINATED)");
}

#[test]
fn test_pool_error_is_transparent() {
    let err = ControllerError::from(PoolError::PoolShutdown);
    assert_eq!(format!("{err}"), "pool has been shut down");
}

#[test]
fn test_resource_error() {
    let err = ControllerError::Resource {
        guid: 3,
        action: "deploy",
        reason: "no route to host".to_string(),
    };
    assert_eq!(format!("{err}"), "resource 3 failed to deploy: no route to host");
}

#[test]
fn test_errors_convert_into_anyhow() {
    fn fails() -> anyhow::Result<()> {
        Err(ControllerError::ControllerGone)?
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<ControllerError>().is_some());
}
