//! Shared fixtures: a simulated resource type that records its lifecycle.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use parking_lot::Mutex;
use prometheus_orchestrator::builders::ControllerBuilder;
use prometheus_orchestrator::core::{AppResult, ExperimentController};
use prometheus_orchestrator::resource::{
    AttrKind, Attribute, Flags, ResourceCore, ResourceFactory, ResourceManager, TraceAttr,
};
use prometheus_orchestrator::util::{init_tracing, Guid};

/// Lifecycle hook invocations, in the order they completed.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<(Guid, &'static str, Instant)>>,
}

impl EventLog {
    pub fn record(&self, guid: Guid, event: &'static str) {
        self.events.lock().push((guid, event, Instant::now()));
    }

    /// When `guid` completed `event`, if it did.
    pub fn at(&self, guid: Guid, event: &'static str) -> Option<Instant> {
        self.events
            .lock()
            .iter()
            .find(|(g, e, _)| *g == guid && *e == event)
            .map(|(_, _, at)| *at)
    }

    pub fn count(&self, event: &'static str) -> usize {
        self.events.lock().iter().filter(|(_, e, _)| *e == event).count()
    }
}

/// Simulated node: deploy optionally sleeps or fails, every hook is logged.
pub struct Node {
    core: ResourceCore,
    log: Arc<EventLog>,
}

impl ResourceManager for Node {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn do_deploy(&self) -> AppResult<()> {
        let delay = self.core.get("deployDelayMs")?.as_int().unwrap_or(0);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay.unsigned_abs()));
        }
        if self.core.get("failDeploy")?.as_bool() == Some(true) {
            bail!("simulated deploy failure");
        }
        self.log.record(self.core.guid(), "deploy");
        Ok(())
    }

    fn do_start(&self) -> AppResult<()> {
        self.log.record(self.core.guid(), "start");
        Ok(())
    }

    fn do_stop(&self) -> AppResult<()> {
        self.log.record(self.core.guid(), "stop");
        Ok(())
    }

    fn do_release(&self) -> AppResult<()> {
        self.log.record(self.core.guid(), "release");
        Ok(())
    }

    fn do_trace(&self, name: &str, attr: TraceAttr, _block: usize, _offset: usize) -> AppResult<String> {
        match attr {
            TraceAttr::Path => Ok(format!("/traces/{}/{name}", self.core.guid())),
            _ => Ok(format!("{name}:{}", self.core.guid())),
        }
    }
}

pub fn node_factory(log: &Arc<EventLog>) -> ResourceFactory {
    let log = Arc::clone(log);
    ResourceFactory::new("node", move |core| Node {
        core,
        log: Arc::clone(&log),
    })
    .with_help("Simulated node")
    .with_attribute(
        Attribute::new("deployDelayMs", AttrKind::Int)
            .with_default(0)
            .with_flags(Flags::EXEC_READ_ONLY),
    )
    .with_attribute(Attribute::new("failDeploy", AttrKind::Bool).with_default(false))
    .with_attribute(Attribute::new("hostname", AttrKind::Str))
    .with_trace("stdout")
}

/// Controller with short intervals so scenarios run quickly.
pub fn fast_builder(log: &Arc<EventLog>) -> ControllerBuilder {
    init_tracing();
    ControllerBuilder::new()
        .with_worker_count(4)
        .with_reschedule_delay_ms(50)
        .with_barrier_interval_ms(100)
        .with_poll_interval_ms(50)
        .with_resource_type(node_factory(log))
}

pub fn controller(log: &Arc<EventLog>) -> Arc<ExperimentController> {
    fast_builder(log).build().unwrap()
}

/// Poll `check` until it holds or `timeout` passes.
pub fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}
