//! Controller and worker pool configuration structures.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the worker pool size.
pub const WORKER_COUNT_ENV: &str = "ORCHESTRATOR_NTHREADS";

/// Worker pool size when no override is given.
pub const DEFAULT_WORKER_COUNT: usize = 20;

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads; `None` defers to `ORCHESTRATOR_NTHREADS`,
    /// then to [`DEFAULT_WORKER_COUNT`].
    pub worker_count: Option<usize>,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            thread_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl WorkerPoolConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads, overriding the environment.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = Some(worker_count);
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Default configuration with the worker count taken from
    /// `ORCHESTRATOR_NTHREADS` (a `.env` file is honored).
    ///
    /// # Errors
    ///
    /// Fails if the variable is set but is not a positive integer.
    pub fn from_env() -> Result<Self, String> {
        Ok(Self::new().with_worker_count(env_worker_count()?))
    }

    /// Number of workers to spawn: the explicit count, else the environment
    /// override, else the default.
    ///
    /// # Errors
    ///
    /// Fails on an explicit zero or a malformed override.
    pub fn resolve_worker_count(&self) -> Result<usize, String> {
        match self.worker_count {
            Some(0) => Err("worker_count must be greater than 0".into()),
            Some(count) => Ok(count),
            None => env_worker_count(),
        }
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.resolve_worker_count()?;
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

fn env_worker_count() -> Result<usize, String> {
    let _ = dotenvy::dotenv();
    let raw = match env::var(WORKER_COUNT_ENV) {
        Ok(raw) => Some(raw),
        Err(env::VarError::NotPresent) => None,
        Err(env::VarError::NotUnicode(_)) => {
            return Err(format!("{WORKER_COUNT_ENV} is not valid unicode"));
        }
    };
    parse_worker_count(raw.as_deref())
}

/// Strict worker count parsing: no trimming, no fallback on malformed input.
///
/// # Errors
///
/// Fails on anything but a positive decimal integer.
pub fn parse_worker_count(raw: Option<&str>) -> Result<usize, String> {
    match raw {
        None => Ok(DEFAULT_WORKER_COUNT),
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) => Err(format!("{WORKER_COUNT_ENV} must be greater than 0")),
            Ok(count) => Ok(count),
            Err(e) => Err(format!("{WORKER_COUNT_ENV}={raw:?} is not an integer: {e}")),
        },
    }
}

/// Root controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Worker pool settings.
    pub pool: WorkerPoolConfig,
    /// Delay before a resource re-evaluates unmet conditions, in milliseconds.
    pub reschedule_delay_ms: u64,
    /// Interval between deployment barrier checks, in milliseconds.
    pub barrier_interval_ms: u64,
    /// Fallback poll interval of the `wait_*` primitives, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long a finished tracked task stays queryable, in seconds.
    pub task_ttl_secs: u64,
    /// Root directory holding `exp_id/run_id` directories.
    pub local_dir: PathBuf,
    /// Save a snapshot of the experiment on release.
    pub persist: bool,
    /// Fixed experiment id; generated when absent.
    pub exp_id: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            pool: WorkerPoolConfig::default(),
            reschedule_delay_ms: 500,
            barrier_interval_ms: 1000,
            poll_interval_ms: 500,
            task_ttl_secs: 600,
            local_dir: env::temp_dir().join("prometheus-orchestrator"),
            persist: false,
            exp_id: None,
        }
    }
}

impl ControllerConfig {
    /// Default configuration with the pool size taken from the environment.
    ///
    /// # Errors
    ///
    /// Fails if the worker count override is malformed.
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            pool: WorkerPoolConfig::from_env()?,
            ..Self::default()
        })
    }

    /// Validate all values.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))?;
        if self.reschedule_delay_ms == 0 {
            return Err("reschedule_delay_ms must be greater than 0".into());
        }
        if self.barrier_interval_ms == 0 {
            return Err("barrier_interval_ms must be greater than 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if self.local_dir.as_os_str().is_empty() {
            return Err("local_dir must not be empty".into());
        }
        if let Some(exp_id) = &self.exp_id {
            if exp_id.is_empty() || exp_id.contains(['/', '\\']) {
                return Err(format!("exp_id `{exp_id}` is not a valid directory name"));
            }
        }
        Ok(())
    }

    /// Parse controller configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Condition re-evaluation delay.
    #[must_use]
    pub const fn reschedule_delay(&self) -> Duration {
        Duration::from_millis(self.reschedule_delay_ms)
    }

    /// Deployment barrier interval.
    #[must_use]
    pub const fn barrier_interval(&self) -> Duration {
        Duration::from_millis(self.barrier_interval_ms)
    }

    /// Wait poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Tracked task time-to-live.
    #[must_use]
    pub const fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }
}
