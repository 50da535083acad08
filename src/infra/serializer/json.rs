//! JSON file backend.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::ControllerResult;

use super::{ExperimentSnapshot, SerializeFormat, Serializer};

/// Writes `<dir>/<exp_id>.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Create a JSON serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn save(
        &self,
        snapshot: &ExperimentSnapshot,
        dir: &Path,
        format: SerializeFormat,
    ) -> ControllerResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", snapshot.exp_id));
        let body = match format {
            SerializeFormat::Json => serde_json::to_string_pretty(snapshot)?,
            SerializeFormat::JsonCompact => serde_json::to_string(snapshot)?,
        };
        fs::write(&path, body)?;
        info!(path = %path.display(), resources = snapshot.resources.len(), "experiment saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::{ControllerState, FailureLevel};

    fn snapshot() -> ExperimentSnapshot {
        ExperimentSnapshot {
            exp_id: "exp-test".to_string(),
            run_id: "run-1".to_string(),
            state: ControllerState::Released,
            failure_level: FailureLevel::Ok,
            groups: BTreeMap::from([(1, vec![1, 2])]),
            resources: Vec::new(),
            taken_at_ms: 0,
        }
    }

    #[test]
    fn test_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("exp-test").join("run-1");
        let path = JsonSerializer::new()
            .save(&snapshot(), &nested, SerializeFormat::Json)
            .unwrap();
        assert_eq!(path, nested.join("exp-test.json"));

        let body = std::fs::read_to_string(&path).unwrap();
        let back: ExperimentSnapshot = serde_json::from_str(&body).unwrap();
        assert_eq!(back.state, ControllerState::Released);
        assert_eq!(back.groups[&1], vec![1, 2]);
    }

    #[test]
    fn test_compact_format_is_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = JsonSerializer
            .save(&snapshot(), dir.path(), SerializeFormat::JsonCompact)
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(!body.contains('\n'));
    }
}
