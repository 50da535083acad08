//! Runtime adapters exposing the blocking controller API to async callers.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_wait;

#[cfg(feature = "tokio-runtime")]
pub use tokio_wait::AsyncWait;
