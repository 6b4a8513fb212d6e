//! In-memory task source

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use parking_lot::RwLock;

use super::{window_start, SourceError, SourceInfo, TaskSource};
use crate::data::TaskRecord;

#[derive(Debug, Clone)]
struct StoredTask {
    record: TaskRecord,
    process_key: String,
    task_key: String,
}

/// Task source holding its rows in process memory
///
/// `today` is explicit so callers can drive day windows deterministically.
pub struct MemoryTaskSource {
    tasks: RwLock<Vec<StoredTask>>,
    today: RwLock<NaiveDate>,
    unavailable: AtomicBool,
}

impl MemoryTaskSource {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            today: RwLock::new(today),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Add or replace a task by id
    pub fn upsert(&self, record: TaskRecord, process_key: &str, task_key: &str) {
        let mut tasks = self.tasks.write();
        tasks.retain(|t| t.record.id != record.id);
        tasks.push(StoredTask {
            record,
            process_key: process_key.to_string(),
            task_key: task_key.to_string(),
        });
    }

    /// Drop a task, as the workflow engine does once it is resolved
    pub fn resolve(&self, id: &str) -> bool {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|t| t.record.id != id);
        tasks.len() != before
    }

    pub fn set_today(&self, today: NaiveDate) {
        *self.today.write() = today;
    }

    /// Make every query fail until flipped back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Connection("task source unavailable".to_string()));
        }
        Ok(())
    }

    fn select<F>(&self, days: u32, filter: F) -> Result<Vec<TaskRecord>, SourceError>
    where
        F: Fn(&StoredTask) -> bool,
    {
        self.check_available()?;
        let start = window_start(*self.today.read(), days);
        let tasks = self.tasks.read();
        Ok(tasks
            .iter()
            .filter(|t| t.record.created_at >= start && filter(t))
            .map(|t| t.record.clone())
            .collect())
    }
}

impl TaskSource for MemoryTaskSource {
    fn tasks_in_range(&self, days: u32) -> Result<Vec<TaskRecord>, SourceError> {
        self.select(days, |_| true)
    }

    fn tasks_by_classification(
        &self,
        days: u32,
        process_key: &str,
        task_keys: &[String],
    ) -> Result<Vec<TaskRecord>, SourceError> {
        self.select(days, |t| {
            t.process_key == process_key && task_keys.iter().any(|k| *k == t.task_key)
        })
    }

    fn today_tasks(
        &self,
        process_key: &str,
        task_keys: &[String],
    ) -> Result<Vec<TaskRecord>, SourceError> {
        self.tasks_by_classification(0, process_key, task_keys)
    }

    fn ping(&self) -> Result<(), SourceError> {
        self.check_available()
    }

    fn info(&self) -> Result<SourceInfo, SourceError> {
        self.check_available()?;
        Ok(SourceInfo {
            backend: "memory",
            location: "in-process".to_string(),
            task_count: self.tasks.read().len() as u64,
        })
    }
}
