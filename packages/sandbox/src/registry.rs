// ABOUTME: Persisted registry of container ids created by this process
// ABOUTME: ~/.vessel/containers.json, used to recover orphans after a crash

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;

/// One registered container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub container_id: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// Small persisted store of container ids. Written on create, cleaned on
/// clean stop, and read by the startup sweep to recover containers orphaned
/// by a crashed session.
///
/// One active task session per process is assumed; the file carries no
/// locking discipline.
pub struct ContainerRegistry {
    path: PathBuf,
}

impl ContainerRegistry {
    /// Registry at the default location (~/.vessel/containers.json)
    pub fn new() -> Self {
        Self {
            path: vessel_core::containers_file(),
        }
    }

    /// Registry at an explicit path, for tests and embedders
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<HashMap<String, RegistryEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &HashMap<String, RegistryEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        debug!("Saved {} containers to registry", entries.len());
        Ok(())
    }

    /// Record a container at creation time
    pub fn register(&self, entry: RegistryEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(entry.container_id.clone(), entry);
        self.save(&entries)
    }

    /// Remove a container after a clean stop
    pub fn unregister(&self, container_id: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.remove(container_id);
        self.save(&entries)
    }

    /// All registered containers
    pub fn entries(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.load()?.into_values().collect())
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        self.save(&HashMap::new())
    }
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str) -> RegistryEntry {
        RegistryEntry {
            container_id: id.to_string(),
            image: "alpine:latest".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_register_and_unregister_round_trip() {
        let dir = tempdir().unwrap();
        let registry = ContainerRegistry::with_path(dir.path().join("containers.json"));

        registry.register(entry("abc")).unwrap();
        registry.register(entry("def")).unwrap();

        let mut ids: Vec<String> = registry
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.container_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["abc", "def"]);

        registry.unregister("abc").unwrap();
        let ids: Vec<String> = registry
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.container_id)
            .collect();
        assert_eq!(ids, vec!["def"]);
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let registry = ContainerRegistry::with_path(dir.path().join("containers.json"));
        assert!(registry.entries().unwrap().is_empty());
    }

    #[test]
    fn test_clear_leaves_empty_registry() {
        let dir = tempdir().unwrap();
        let registry = ContainerRegistry::with_path(dir.path().join("containers.json"));

        registry.register(entry("abc")).unwrap();
        registry.clear().unwrap();
        assert!(registry.entries().unwrap().is_empty());
    }

    #[test]
    fn test_registry_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("containers.json");

        ContainerRegistry::with_path(path.clone())
            .register(entry("abc"))
            .unwrap();

        let reopened = ContainerRegistry::with_path(path);
        assert_eq!(reopened.entries().unwrap().len(), 1);
    }
}
