//! SQLite-backed task source
//!
//! Reads the `current_task` table, which mirrors the workflow engine's view of
//! open tasks. A task with neither `assignee` nor `assignee_id` is unclaimed;
//! anything else is unfinished.

use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};

use super::{window_start, SourceError, SourceInfo, TaskSource};
use crate::data::{Classification, TaskRecord, TIMESTAMP_FORMAT};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS current_task (
    proc_id     TEXT NOT NULL,
    create_time TEXT NOT NULL,   -- yyyy-MM-dd HH:mm:ss, local time
    assignee    TEXT,
    assignee_id TEXT,
    proc_key    TEXT NOT NULL,
    task_key    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_current_task_create_time ON current_task (create_time);
";

const SELECT_TASKS: &str = "
SELECT proc_id, create_time,
       CASE WHEN assignee IS NULL AND assignee_id IS NULL
            THEN 'unclaimed' ELSE 'unfinished' END AS task_status
FROM current_task
WHERE create_time >= ?1";

/// Task source over a SQLite database file
pub struct SqliteTaskSource {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteTaskSource {
    /// Open (or create) the database and make sure the table exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let location = path.as_ref().display().to_string();
        let conn = Connection::open(path.as_ref())
            .map_err(|e| SourceError::Connection(format!("open {}: {}", location, e)))?;
        Self::from_connection(conn, location)
    }

    pub fn open_in_memory() -> Result<Self, SourceError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        Self::from_connection(conn, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, location: String) -> Result<Self, SourceError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Insert a task row; used for seeding and by tests
    pub fn insert_task(
        &self,
        id: &str,
        created_at: NaiveDateTime,
        assignee: Option<&str>,
        process_key: &str,
        task_key: &str,
    ) -> Result<(), SourceError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO current_task (proc_id, create_time, assignee, assignee_id, proc_key, task_key)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5)",
            rusqlite::params![
                id,
                created_at.format(TIMESTAMP_FORMAT).to_string(),
                assignee,
                process_key,
                task_key
            ],
        )?;
        Ok(())
    }

    /// Remove a task row, as the workflow engine does on completion
    pub fn delete_task(&self, id: &str) -> Result<usize, SourceError> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM current_task WHERE proc_id = ?1", [id])?)
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn query(
        &self,
        days: u32,
        filter: Option<(&str, &[String])>,
    ) -> Result<Vec<TaskRecord>, SourceError> {
        let start = window_start(Self::today(), days)
            .format(TIMESTAMP_FORMAT)
            .to_string();

        let mut sql = SELECT_TASKS.to_string();
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(start)];

        if let Some((process_key, task_keys)) = filter {
            if task_keys.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND proc_key = ?{}", params.len() + 1));
            params.push(SqlValue::Text(process_key.to_string()));

            let placeholders: Vec<String> = (0..task_keys.len())
                .map(|i| format!("?{}", params.len() + 1 + i))
                .collect();
            sql.push_str(&format!(" AND task_key IN ({})", placeholders.join(", ")));
            params.extend(task_keys.iter().map(|k| SqlValue::Text(k.clone())));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, create_time, status) = row?;
            match decode_row(&id, &create_time, &status) {
                Some(task) => tasks.push(task),
                None => {
                    tracing::warn!(
                        task_id = %id,
                        create_time = %create_time,
                        status = %status,
                        "Skipping task row that could not be decoded"
                    );
                }
            }
        }

        Ok(tasks)
    }
}

fn decode_row(id: &str, create_time: &str, status: &str) -> Option<TaskRecord> {
    let created_at = NaiveDateTime::parse_from_str(create_time, TIMESTAMP_FORMAT).ok()?;
    let classification = Classification::parse(status)?;
    Some(TaskRecord::new(id, created_at, classification))
}

impl TaskSource for SqliteTaskSource {
    fn tasks_in_range(&self, days: u32) -> Result<Vec<TaskRecord>, SourceError> {
        self.query(days, None)
    }

    fn tasks_by_classification(
        &self,
        days: u32,
        process_key: &str,
        task_keys: &[String],
    ) -> Result<Vec<TaskRecord>, SourceError> {
        self.query(days, Some((process_key, task_keys)))
    }

    fn today_tasks(
        &self,
        process_key: &str,
        task_keys: &[String],
    ) -> Result<Vec<TaskRecord>, SourceError> {
        self.query(0, Some((process_key, task_keys)))
    }

    fn ping(&self) -> Result<(), SourceError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| SourceError::Connection(e.to_string()))
    }

    fn info(&self) -> Result<SourceInfo, SourceError> {
        let conn = self.conn.lock();
        let task_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM current_task", [], |row| row.get(0))?;
        Ok(SourceInfo {
            backend: "sqlite",
            location: self.location.clone(),
            task_count: u64::try_from(task_count).unwrap_or(0),
        })
    }
}
