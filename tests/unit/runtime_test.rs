//! Tests for the tokio adapter

use std::time::Duration;

use prometheus_orchestrator::builders::ControllerBuilder;
use prometheus_orchestrator::core::ControllerState;
use prometheus_orchestrator::resource::{
    ResourceCore, ResourceFactory, ResourceManager, ResourceState,
};
use prometheus_orchestrator::runtime::AsyncWait;

struct Probe(ResourceCore);

impl ResourceManager for Probe {
    fn core(&self) -> &ResourceCore {
        &self.0
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_deploy_and_shutdown() {
    let ec = ControllerBuilder::new()
        .with_worker_count(2)
        .with_barrier_interval_ms(50)
        .with_poll_interval_ms(20)
        .with_reschedule_delay_ms(20)
        .with_resource_type(ResourceFactory::new("probe", Probe))
        .build()
        .unwrap();
    let a = ec.register_resource("probe").unwrap();
    let b = ec.register_resource("probe").unwrap();

    ec.deploy(None, true, None).unwrap();
    let started = tokio::time::timeout(Duration::from_secs(5), ec.wait_started_async(vec![a, b]))
        .await
        .expect("wait_started timed out")
        .unwrap();
    assert_eq!(started.len(), 2);

    ec.shutdown_async().await.unwrap();
    assert_eq!(ec.state(), ControllerState::Terminated);
    assert_eq!(ec.resource_state(a).unwrap(), ResourceState::Released);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_release_is_idempotent() {
    let ec = ControllerBuilder::new()
        .with_worker_count(1)
        .with_poll_interval_ms(20)
        .with_resource_type(ResourceFactory::new("probe", Probe))
        .build()
        .unwrap();
    let a = ec.register_resource("probe").unwrap();

    ec.release_async(Some(vec![a])).await.unwrap();
    ec.release_async(None).await.unwrap();
    assert_eq!(ec.state(), ControllerState::Released);
    assert_eq!(
        ec.wait_released_async(vec![a]).await.unwrap(),
        vec![a]
    );
}
