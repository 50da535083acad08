//! Tests for utility functions

use std::time::Duration;

use prometheus_orchestrator::core::ControllerError;
use prometheus_orchestrator::util::{parse_delay, run_stamp, IdGenerator};

#[test]
fn test_parse_delay_units() {
    assert_eq!(parse_delay("1.5s").unwrap(), Duration::from_millis(1500));
    assert_eq!(parse_delay("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_delay("2m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_delay("1h").unwrap(), Duration::from_secs(3600));
    assert_eq!(parse_delay("3").unwrap(), Duration::from_secs(3));
}

#[test]
fn test_parse_delay_rejects_garbage() {
    for input in ["", "s", "1d", "1..5s", "-1s", "tomorrow"] {
        assert!(
            matches!(parse_delay(input), Err(ControllerError::InvalidDate(_))),
            "{input} should be rejected"
        );
    }
}

#[test]
fn test_id_generators_are_independent() {
    let a = IdGenerator::default();
    let b = IdGenerator::starting_at(10);
    assert_eq!(a.next_id(), 1);
    assert_eq!(b.next_id(), 10);
    assert_eq!(a.next_id(), 2);
}

#[test]
fn test_run_stamp_format() {
    let stamp = run_stamp();
    assert!(stamp.starts_with("run-"));
    assert!(stamp["run-".len()..].chars().all(|c| c.is_ascii_digit()));
}
