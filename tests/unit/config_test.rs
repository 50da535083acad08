//! Tests for configuration validation

use prometheus_orchestrator::config::{
    parse_worker_count, ControllerConfig, WorkerPoolConfig, DEFAULT_WORKER_COUNT,
};
use std::time::Duration;

#[test]
fn test_pool_config_defaults() {
    let config = WorkerPoolConfig::default();
    assert_eq!(config.worker_count, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_worker_count() {
    let invalid = WorkerPoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
    assert!(invalid.resolve_worker_count().is_err());
    assert_eq!(WorkerPoolConfig::new().with_worker_count(6).resolve_worker_count(), Ok(6));
}

#[test]
fn test_pool_config_invalid_stack_size() {
    let invalid = WorkerPoolConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_parse_worker_count_is_strict() {
    assert_eq!(parse_worker_count(None).unwrap(), DEFAULT_WORKER_COUNT);
    assert_eq!(parse_worker_count(Some("8")).unwrap(), 8);
    assert!(parse_worker_count(Some("0")).is_err());
    assert!(parse_worker_count(Some("eight")).is_err());
    assert!(parse_worker_count(Some(" 8")).is_err());
    assert!(parse_worker_count(Some("-3")).is_err());
    assert!(parse_worker_count(Some("")).is_err());
}

#[test]
fn test_controller_config_defaults() {
    let config = ControllerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.reschedule_delay(), Duration::from_millis(500));
    assert_eq!(config.barrier_interval(), Duration::from_secs(1));
    assert_eq!(config.poll_interval(), Duration::from_millis(500));
    assert_eq!(config.task_ttl(), Duration::from_secs(600));
    assert!(!config.persist);
    assert!(config.exp_id.is_none());
}

#[test]
fn test_controller_config_rejects_zero_intervals() {
    let mut config = ControllerConfig::default();
    config.barrier_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = ControllerConfig::default();
    config.poll_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = ControllerConfig::default();
    config.reschedule_delay_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_controller_config_rejects_path_like_exp_id() {
    let config = ControllerConfig {
        exp_id: Some("../escape".to_string()),
        ..ControllerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_controller_config_from_json() {
    let config = ControllerConfig::from_json_str(
        r#"{"pool": {"worker_count": 4}, "poll_interval_ms": 100, "exp_id": "ping"}"#,
    )
    .unwrap();
    assert_eq!(config.pool.worker_count, Some(4));
    assert_eq!(config.poll_interval_ms, 100);
    assert_eq!(config.barrier_interval_ms, 1000);
    assert_eq!(config.exp_id.as_deref(), Some("ping"));
}

#[test]
fn test_controller_config_from_json_validates() {
    assert!(ControllerConfig::from_json_str(r#"{"pool": {"worker_count": 0}}"#).is_err());
    assert!(ControllerConfig::from_json_str("not json").is_err());
}
