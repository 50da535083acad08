//! Tokio adapter: runs the blocking waits, release and shutdown on tokio's
//! blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{ControllerError, ControllerResult, ExperimentController, PoolError};
use crate::util::Guid;

/// Async counterparts of the controller's blocking operations.
#[async_trait]
pub trait AsyncWait {
    /// [`ExperimentController::wait_deployed`] without blocking the runtime.
    async fn wait_deployed_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>>;

    /// [`ExperimentController::wait_started`] without blocking the runtime.
    async fn wait_started_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>>;

    /// [`ExperimentController::wait_finished`] without blocking the runtime.
    async fn wait_finished_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>>;

    /// [`ExperimentController::wait_released`] without blocking the runtime.
    async fn wait_released_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>>;

    /// [`ExperimentController::release`] without blocking the runtime.
    async fn release_async(&self, guids: Option<Vec<Guid>>) -> ControllerResult<()>;

    /// [`ExperimentController::shutdown`] without blocking the runtime.
    async fn shutdown_async(&self) -> ControllerResult<()>;
}

async fn blocking<T, F>(ec: &Arc<ExperimentController>, op: F) -> ControllerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ExperimentController) -> ControllerResult<T> + Send + 'static,
{
    let ec = Arc::clone(ec);
    tokio::task::spawn_blocking(move || op(&ec))
        .await
        .map_err(|e| ControllerError::Pool(PoolError::Internal(format!("blocking task failed: {e}"))))?
}

#[async_trait]
impl AsyncWait for Arc<ExperimentController> {
    async fn wait_deployed_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>> {
        blocking(self, move |ec| ec.wait_deployed(&guids)).await
    }

    async fn wait_started_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>> {
        blocking(self, move |ec| ec.wait_started(&guids)).await
    }

    async fn wait_finished_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>> {
        blocking(self, move |ec| ec.wait_finished(&guids)).await
    }

    async fn wait_released_async(&self, guids: Vec<Guid>) -> ControllerResult<Vec<Guid>> {
        blocking(self, move |ec| ec.wait_released(&guids)).await
    }

    async fn release_async(&self, guids: Option<Vec<Guid>>) -> ControllerResult<()> {
        blocking(self, move |ec| ec.release(guids.as_deref())).await
    }

    async fn shutdown_async(&self) -> ControllerResult<()> {
        blocking(self, ExperimentController::shutdown).await
    }
}
