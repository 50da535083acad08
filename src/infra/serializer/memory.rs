//! In-memory backend for development and testing.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::ControllerResult;

use super::{ExperimentSnapshot, SerializeFormat, Serializer};

/// Keeps every saved snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemorySerializer {
    saved: Mutex<Vec<(PathBuf, ExperimentSnapshot)>>,
}

impl InMemorySerializer {
    /// Create an empty serializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saved.lock().len()
    }

    /// Most recently saved snapshot.
    #[must_use]
    pub fn last(&self) -> Option<ExperimentSnapshot> {
        self.saved.lock().last().map(|(_, snapshot)| snapshot.clone())
    }
}

impl Serializer for InMemorySerializer {
    fn save(
        &self,
        snapshot: &ExperimentSnapshot,
        dir: &Path,
        _format: SerializeFormat,
    ) -> ControllerResult<PathBuf> {
        let path = dir.join(format!("{}.json", snapshot.exp_id));
        self.saved.lock().push((path.clone(), snapshot.clone()));
        Ok(path)
    }
}
