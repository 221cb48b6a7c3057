//! JSON snapshot persistence for the destination registry.
//!
//! The registry lives in memory; a snapshot file lets the CLI and the
//! server carry verified destinations and resolved conflicts across runs.

use super::types::{ConflictResolution, VerifiedDestination};
use crate::error::GeoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub destinations: Vec<VerifiedDestination>,
    #[serde(default)]
    pub conflicts: Vec<ConflictResolution>,
}

/// Default snapshot location: `~/.meridian/registry.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".meridian").join("registry.json"))
}

/// Read a snapshot. A missing file is `Ok(None)`.
pub fn load_from(path: &Path) -> Result<Option<RegistrySnapshot>, GeoError> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: RegistrySnapshot = serde_json::from_str(&data)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(GeoError::Config(format!(
            "registry snapshot {} has version {}, newest supported is {}",
            path.display(),
            snapshot.version,
            SNAPSHOT_VERSION
        )));
    }
    Ok(Some(snapshot))
}

/// Write a snapshot, creating parent directories as needed.
pub fn save_to(path: &Path, snapshot: &RegistrySnapshot) -> Result<(), GeoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::landmarks::seed_destinations;
    use crate::registry::manager::GeographicDataManager;
    use crate::testing::FakeVerifier;
    use std::sync::Arc;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_and_reload_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.json");

        let manager = GeographicDataManager::new(Arc::new(FakeVerifier::accurate()));
        let first = seed_destinations().remove(0);
        manager.add_verified_destination(first).unwrap();
        save_to(&path, &manager.snapshot()).unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.destinations.len(), 1);

        let restored = GeographicDataManager::new(Arc::new(FakeVerifier::accurate()));
        assert_eq!(restored.restore(loaded), 1);
        assert_eq!(restored.list(), manager.list());
    }

    #[test]
    fn test_future_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let snapshot = RegistrySnapshot {
            version: SNAPSHOT_VERSION + 1,
            saved_at: Utc::now(),
            destinations: Vec::new(),
            conflicts: Vec::new(),
        };
        save_to(&path, &snapshot).unwrap();
        assert!(matches!(load_from(&path), Err(GeoError::Config(_))));
    }

    #[test]
    fn test_garbage_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_from(&path), Err(GeoError::Io(_))));
    }
}
