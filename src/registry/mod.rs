//! Registry of tasks that have breached their SLA today

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::data::{Classification, TaskRecord};

/// Outstanding timeout tasks, one collection per classification
///
/// Inserts are idempotent upserts keyed by task id. Entries only leave through
/// [`TimeoutRegistry::clear`] at the daily rollover.
#[derive(Debug, Default)]
pub struct TimeoutRegistry {
    unclaimed: DashMap<String, TaskRecord>,
    unfinished: DashMap<String, TaskRecord>,
}

impl TimeoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, category: Classification) -> &DashMap<String, TaskRecord> {
        match category {
            Classification::Unclaimed => &self.unclaimed,
            Classification::Unfinished => &self.unfinished,
        }
    }

    /// Upsert `task` into the `category` collection. Returns true if the id is new.
    pub fn record(&self, task: &TaskRecord, category: Classification) -> bool {
        self.collection(category)
            .insert(task.id.clone(), task.clone())
            .is_none()
    }

    pub fn count(&self, category: Classification) -> usize {
        self.collection(category).len()
    }

    pub fn contains(&self, task_id: &str, category: Classification) -> bool {
        self.collection(category).contains_key(task_id)
    }

    /// Point-in-time copy of one collection, ordered by id
    pub fn tasks(&self, category: Classification) -> BTreeMap<String, TaskRecord> {
        self.collection(category)
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Replace one collection wholesale, used when restoring a snapshot
    pub fn replace(&self, category: Classification, tasks: BTreeMap<String, TaskRecord>) {
        let collection = self.collection(category);
        collection.clear();
        for (id, task) in tasks {
            collection.insert(id, task);
        }
    }

    /// Empty both collections
    pub fn clear(&self) {
        self.unclaimed.clear();
        self.unfinished.clear();
        tracing::info!("Cleared all timeout task records for the new day");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn task(id: &str, minute: u32, classification: Classification) -> TaskRecord {
        let created = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap();
        TaskRecord::new(id, created, classification)
    }

    #[test]
    fn test_record_is_idempotent() {
        let registry = TimeoutRegistry::new();
        let t1 = task("T1", 0, Classification::Unclaimed);

        assert!(registry.record(&t1, Classification::Unclaimed));
        assert!(!registry.record(&t1, Classification::Unclaimed));
        assert_eq!(registry.count(Classification::Unclaimed), 1);
        assert_eq!(registry.count(Classification::Unfinished), 0);
    }

    #[test]
    fn test_upsert_overwrites() {
        let registry = TimeoutRegistry::new();
        registry.record(&task("T1", 0, Classification::Unfinished), Classification::Unfinished);
        registry.record(&task("T1", 7, Classification::Unfinished), Classification::Unfinished);

        let tasks = registry.tasks(Classification::Unfinished);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks["T1"].created_at.format("%M").to_string(), "07");
    }

    #[test]
    fn test_clear_empties_both() {
        let registry = TimeoutRegistry::new();
        registry.record(&task("A", 0, Classification::Unclaimed), Classification::Unclaimed);
        registry.record(&task("B", 0, Classification::Unfinished), Classification::Unfinished);

        registry.clear();
        assert_eq!(registry.count(Classification::Unclaimed), 0);
        assert_eq!(registry.count(Classification::Unfinished), 0);
    }
}
