//! Snapshot and restore of the timeout registry

use std::collections::BTreeMap;
use std::path::Path;

use super::file::FileBackend;
use super::{PersistenceBackend, PersistenceError};
use crate::data::{Classification, TaskRecord};
use crate::registry::TimeoutRegistry;

/// Storage key for each registry collection
pub fn snapshot_key(category: Classification) -> &'static str {
    match category {
        Classification::Unclaimed => "timeout_tasks",
        Classification::Unfinished => "timeout_finish_tasks",
    }
}

/// Entry counts loaded by [`SnapshotStore::restore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub unclaimed: usize,
    pub unfinished: usize,
}

/// Writes and reloads both registry collections
pub struct SnapshotStore {
    backend: Box<dyn PersistenceBackend>,
}

impl SnapshotStore {
    /// Snapshot store writing JSON files into `data_dir`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::with_backend(Box::new(FileBackend::new(data_dir)))
    }

    pub fn with_backend(backend: Box<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Persist both collections, replacing whatever was stored before
    pub fn snapshot(&self, registry: &TimeoutRegistry) -> Result<(), PersistenceError> {
        for category in Classification::ALL {
            let tasks = registry.tasks(category);
            let data = serde_json::to_vec_pretty(&tasks)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            self.backend.write(snapshot_key(category), &data)?;

            tracing::debug!(
                category = %category,
                tasks = tasks.len(),
                "Saved timeout task snapshot"
            );
        }

        tracing::info!(
            unclaimed = registry.count(Classification::Unclaimed),
            unfinished = registry.count(Classification::Unfinished),
            "Timeout task snapshot written"
        );
        Ok(())
    }

    /// Load one collection. `Ok(None)` when nothing has been stored yet.
    pub fn load(
        &self,
        category: Classification,
    ) -> Result<Option<BTreeMap<String, TaskRecord>>, PersistenceError> {
        let Some(data) = self.backend.read(snapshot_key(category))? else {
            return Ok(None);
        };

        let tasks: BTreeMap<String, TaskRecord> = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
        Ok(Some(tasks))
    }

    /// Reload both collections into `registry`
    ///
    /// A missing, unreadable, or malformed blob restores as an empty collection.
    pub fn restore(&self, registry: &TimeoutRegistry) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        for category in Classification::ALL {
            let tasks = match self.load(category) {
                Ok(Some(tasks)) => tasks,
                Ok(None) => {
                    tracing::info!(category = %category, "No timeout task snapshot found, starting empty");
                    BTreeMap::new()
                }
                Err(e) => {
                    tracing::warn!(
                        category = %category,
                        error = %e,
                        "Failed to load timeout task snapshot, starting empty"
                    );
                    BTreeMap::new()
                }
            };

            match category {
                Classification::Unclaimed => summary.unclaimed = tasks.len(),
                Classification::Unfinished => summary.unfinished = tasks.len(),
            }
            registry.replace(category, tasks);
        }

        tracing::info!(
            unclaimed = summary.unclaimed,
            unfinished = summary.unfinished,
            "Timeout task snapshot restored"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn task(id: &str, minute: u32, classification: Classification) -> TaskRecord {
        let created = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap();
        TaskRecord::new(id, created, classification)
    }

    struct FailingBackend;

    impl PersistenceBackend for FailingBackend {
        fn write(&self, _key: &str, _data: &[u8]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "unreadable",
            )))
        }
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        let registry = TimeoutRegistry::new();
        registry.record(&task("A", 1, Classification::Unclaimed), Classification::Unclaimed);
        registry.record(&task("B", 2, Classification::Unclaimed), Classification::Unclaimed);
        registry.record(&task("C", 3, Classification::Unfinished), Classification::Unfinished);
        store.snapshot(&registry).unwrap();

        let restored = TimeoutRegistry::new();
        let summary = store.restore(&restored);

        assert_eq!(summary, RestoreSummary { unclaimed: 2, unfinished: 1 });
        for category in Classification::ALL {
            assert_eq!(restored.tasks(category), registry.tasks(category));
        }
    }

    #[test]
    fn test_file_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        let registry = TimeoutRegistry::new();
        registry.record(&task("A", 1, Classification::Unclaimed), Classification::Unclaimed);
        store.snapshot(&registry).unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join("timeout_tasks.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["A"]["taskId"], "A");
        assert_eq!(json["A"]["createTime"], "2026-03-10 10:01:00");
        assert_eq!(json["A"]["type"], "unclaimed");

        let raw = std::fs::read_to_string(temp_dir.path().join("timeout_finish_tasks.json")).unwrap();
        assert_eq!(raw.trim(), "{}");
    }

    #[test]
    fn test_snapshot_overwrites_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        let registry = TimeoutRegistry::new();
        registry.record(&task("A", 1, Classification::Unclaimed), Classification::Unclaimed);
        store.snapshot(&registry).unwrap();

        registry.clear();
        store.snapshot(&registry).unwrap();

        let restored = TimeoutRegistry::new();
        assert_eq!(store.restore(&restored), RestoreSummary::default());
    }

    #[test]
    fn test_missing_files_restore_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("never-written"));

        let registry = TimeoutRegistry::new();
        registry.record(&task("stale", 1, Classification::Unclaimed), Classification::Unclaimed);

        assert_eq!(store.restore(&registry), RestoreSummary::default());
        assert_eq!(registry.count(Classification::Unclaimed), 0);
        assert!(store.load(Classification::Unclaimed).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_restores_empty() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("timeout_tasks.json"), "{not json").unwrap();

        let store = SnapshotStore::new(temp_dir.path());
        assert!(matches!(
            store.load(Classification::Unclaimed),
            Err(PersistenceError::Deserialization(_))
        ));

        let registry = TimeoutRegistry::new();
        assert_eq!(store.restore(&registry).unclaimed, 0);
    }

    #[test]
    fn test_backend_failures() {
        let store = SnapshotStore::with_backend(Box::new(FailingBackend));
        let registry = TimeoutRegistry::new();

        assert!(matches!(store.snapshot(&registry), Err(PersistenceError::Io(_))));
        assert_eq!(store.restore(&registry), RestoreSummary::default());
    }
}
