//! Previous-run state
//!
//! The last snapshot and its timestamp are kept in a small JSON file so the
//! next run can turn cumulative counters into rates.

use crate::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

use super::PluginError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginState {
    /// Unix seconds the snapshot was taken at
    pub last_time: i64,
    pub values: MetricsSnapshot,
}

impl PluginState {
    pub fn new(last_time: i64, values: MetricsSnapshot) -> Self {
        PluginState { last_time, values }
    }

    /// Load the previous run. Missing or unreadable state is "no previous run".
    pub fn load(path: &Path) -> Option<PluginState> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read plugin state");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding corrupt plugin state");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PluginError> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut values = MetricsSnapshot::new();
        values.insert("processed", 100u64);
        values.insert("QueueLatency.default", 3.5);
        let state = PluginState::new(1_700_000_000, values);

        state.save(&path).unwrap();
        assert_eq!(PluginState::load(&path), Some(state));
    }

    #[test]
    fn test_missing_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PluginState::load(&dir.path().join("absent")), None);
    }

    #[test]
    fn test_corrupt_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(PluginState::load(&path), None);
    }
}
