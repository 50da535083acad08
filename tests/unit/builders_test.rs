//! Tests for builder modules

use std::sync::Arc;

use prometheus_orchestrator::builders::ControllerBuilder;
use prometheus_orchestrator::config::ControllerConfig;
use prometheus_orchestrator::core::{ControllerError, ControllerState};
use prometheus_orchestrator::infra::{InMemorySerializer, Serializer};
use prometheus_orchestrator::resource::{ResourceCore, ResourceFactory, ResourceManager};

struct Probe(ResourceCore);

impl ResourceManager for Probe {
    fn core(&self) -> &ResourceCore {
        &self.0
    }
}

#[test]
fn test_builder_registers_resource_types() {
    let ec = ControllerBuilder::new()
        .with_worker_count(2)
        .with_exp_id("built")
        .with_resource_type(ResourceFactory::new("probe", Probe))
        .build()
        .unwrap();
    assert_eq!(ec.exp_id(), "built");
    assert_eq!(ec.resource_types(), vec!["probe".to_string()]);
    assert_eq!(ec.state(), ControllerState::Running);
    assert_eq!(ec.pool_stats().worker_count, 2);
}

#[test]
fn test_builder_rejects_duplicate_types() {
    let err = ControllerBuilder::new()
        .with_worker_count(1)
        .with_resource_type(ResourceFactory::new("probe", Probe))
        .with_resource_type(ResourceFactory::new("probe", Probe))
        .build()
        .unwrap_err();
    assert!(matches!(err, ControllerError::DuplicateResourceType(_)));
}

#[test]
fn test_builder_from_config_keeps_values() {
    let config = ControllerConfig {
        barrier_interval_ms: 250,
        ..ControllerConfig::default()
    };
    let builder = ControllerBuilder::from_config(config)
        .with_worker_count(1)
        .with_serializer(Arc::new(InMemorySerializer::new()) as Arc<dyn Serializer>);
    assert_eq!(builder.config().barrier_interval_ms, 250);
    assert_eq!(builder.config().pool.worker_count, Some(1));
}

#[test]
fn test_generated_exp_ids_are_unique() {
    let a = ControllerBuilder::new().with_worker_count(1).build().unwrap();
    let b = ControllerBuilder::new().with_worker_count(1).build().unwrap();
    assert!(a.exp_id().starts_with("exp-"));
    assert_ne!(a.exp_id(), b.exp_id());
}
