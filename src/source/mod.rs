//! Task source adapters
//!
//! The workflow store is external; the monitor only sees it through
//! [`TaskSource`]. Two adapters ship with the crate: a SQLite-backed one for
//! deployments and an in-memory one used by tests and local runs.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryTaskSource;
pub use sqlite::SqliteTaskSource;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::data::TaskRecord;

/// Query interface over the workflow task store
///
/// All calls are synchronous; implementations enforce their own timeouts.
pub trait TaskSource: Send + Sync {
    /// Every current task created within the last `days` days, unfiltered
    fn tasks_in_range(&self, days: u32) -> Result<Vec<TaskRecord>, SourceError>;

    /// Current tasks from the last `days` days for one process and set of task keys
    fn tasks_by_classification(
        &self,
        days: u32,
        process_key: &str,
        task_keys: &[String],
    ) -> Result<Vec<TaskRecord>, SourceError>;

    /// Current tasks created today for one process and set of task keys
    fn today_tasks(
        &self,
        process_key: &str,
        task_keys: &[String],
    ) -> Result<Vec<TaskRecord>, SourceError>;

    /// Connectivity probe for readiness reporting
    fn ping(&self) -> Result<(), SourceError>;

    /// Backend kind, location and current task count for the status page
    fn info(&self) -> Result<SourceInfo, SourceError>;
}

/// Description of the backing store
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub backend: &'static str,
    pub location: String,
    pub task_count: u64,
}

/// Start of the query window: midnight `days` days before `today`
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDateTime {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::default())
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl From<rusqlite::Error> for SourceError {
    fn from(e: rusqlite::Error) -> Self {
        SourceError::Query(e.to_string())
    }
}
