//! The check cycle: daily report, onboarding count, timeout scan, snapshot

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use super::daily::{count_business_hour_timeouts, DayTransition};
use super::state::MonitorState;
use crate::alerts::{messages, AlertTransport, Delivery, NotifierError};
use crate::config::MonitorConfig;
use crate::data::{Classification, TaskRecord, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::metrics::MonitorMetrics;
use crate::persistence::{PersistenceError, RestoreSummary, SnapshotStore};
use crate::source::{SourceError, SourceInfo, TaskSource};

/// Alerts go out from 09:00 up to (not including) 21:00
pub const WORK_START_HOUR: u32 = 9;
pub const WORK_END_HOUR: u32 = 21;

pub fn is_working_hours(now: NaiveDateTime) -> bool {
    (WORK_START_HOUR..WORK_END_HOUR).contains(&now.hour())
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub daily_report_sent: bool,
    pub newly_onboarded: u64,
    pub unclaimed_breaching: usize,
    pub unfinished_breaching: usize,
    pub unclaimed_alerted: usize,
    pub unfinished_alerted: usize,
    pub snapshot_written: bool,
}

/// SLA monitor over one task source
pub struct TaskMonitor {
    config: MonitorConfig,
    source: Arc<dyn TaskSource>,
    transport: Arc<dyn AlertTransport>,
    snapshots: SnapshotStore,
    metrics: MonitorMetrics,
    state: MonitorState,
}

impl TaskMonitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn TaskSource>,
        transport: Arc<dyn AlertTransport>,
        metrics: MonitorMetrics,
        started_at: NaiveDateTime,
    ) -> Self {
        let snapshots = SnapshotStore::new(&config.persist_dir);
        let state = MonitorState::new(config.alert_cooldown(), started_at);
        Self {
            config,
            source,
            transport,
            snapshots,
            metrics,
            state,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    /// Run a blocking source call off the async runtime
    async fn query_source<T, F>(&self, f: F) -> Result<T, SourceError>
    where
        F: FnOnce(&dyn TaskSource) -> Result<T, SourceError> + Send + 'static,
        T: Send + 'static,
    {
        let source = Arc::clone(&self.source);
        match tokio::task::spawn_blocking(move || f(source.as_ref())).await {
            Ok(result) => result,
            Err(e) => Err(SourceError::Connection(format!("source task failed: {}", e))),
        }
    }

    pub async fn ping_source(&self) -> Result<(), SourceError> {
        self.query_source(|source| source.ping()).await
    }

    pub async fn source_info(&self) -> Result<SourceInfo, SourceError> {
        self.query_source(|source| source.info()).await
    }

    /// Reload the timeout registry from the last snapshot
    pub fn restore(&self) -> RestoreSummary {
        self.snapshots.restore(self.state.registry())
    }

    /// Write the registry out immediately, regardless of cadence
    pub fn snapshot_now(&self) -> Result<(), PersistenceError> {
        self.snapshots.snapshot(self.state.registry())
    }

    /// Run one full check cycle at `now`
    ///
    /// A task source failure aborts the remaining steps; the next cycle
    /// starts from scratch.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> Result<CycleReport, MonitorError> {
        let mut report = CycleReport::default();

        if let DayTransition::RolledOver { previous: Some(previous) } = self.state.begin_day(now.date()) {
            tracing::info!(
                previous = %previous.format(DATE_FORMAT),
                today = %now.date().format(DATE_FORMAT),
                "Day rolled over"
            );
        }

        report.daily_report_sent = self.send_daily_report(now).await;
        report.newly_onboarded = self.count_onboarding(now).await?;

        let (unclaimed, unfinished) = self.scan_timeouts(now).await?;
        report.unclaimed_breaching = unclaimed.len();
        report.unfinished_breaching = unfinished.len();
        report.unclaimed_alerted = self
            .alert_breaches(Classification::Unclaimed, &unclaimed, now)
            .await;
        report.unfinished_alerted = self
            .alert_breaches(Classification::Unfinished, &unfinished, now)
            .await;

        report.snapshot_written = self.snapshot_if_due(now)?;
        Ok(report)
    }

    async fn send_daily_report(&self, now: NaiveDateTime) -> bool {
        if !self.state.daily_report_due(now) {
            return false;
        }

        let today = now.date();
        let yesterday = today.pred_opt().unwrap_or(NaiveDate::MIN);
        tracing::info!(date = %yesterday.format(DATE_FORMAT), "Sending daily report");

        let unfinished = count_business_hour_timeouts(
            self.state.registry().tasks(Classification::Unfinished).values(),
            now,
        );
        let onboarded = self
            .state
            .with_daily(|daily| daily.onboarding.finalized_count(yesterday, today));

        let message = messages::daily_stats(
            &yesterday.format(DATE_FORMAT).to_string(),
            unfinished,
            onboarded,
        );

        match self.transport.post(&message, &self.config.channels.daily_stats).await {
            Ok(_) => {
                self.state.registry().clear();
                self.state.with_daily(|daily| daily.mark_report_done());
                tracing::info!(onboarded, unfinished, "Daily report sent");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Daily report not delivered, retrying next cycle");
                false
            }
        }
    }

    async fn count_onboarding(&self, now: NaiveDateTime) -> Result<u64, MonitorError> {
        let process_key = self.config.process_key.clone();
        let task_keys = self.config.task_keys.clone();
        let tasks = self
            .query_source(move |source| source.today_tasks(&process_key, &task_keys))
            .await?;

        let (new, total) = self.state.with_daily(|daily| {
            let new = daily
                .onboarding
                .absorb(tasks.iter().map(|task| task.id.as_str()), now);
            (new, daily.onboarding.running())
        });

        if new > 0 {
            self.metrics.increment_task_total(new);
            tracing::info!(new, total, "Onboarding count updated");
        } else {
            tracing::debug!(total, "No new onboarding tasks");
        }
        Ok(new)
    }

    /// Split currently breaching tasks by classification and record them
    async fn scan_timeouts(
        &self,
        now: NaiveDateTime,
    ) -> Result<(Vec<TaskRecord>, Vec<TaskRecord>), MonitorError> {
        let window_days = self.config.scan_window_days;
        let process_key = self.config.process_key.clone();
        let task_keys = self.config.task_keys.clone();
        let tasks = self
            .query_source(move |source| {
                source.tasks_by_classification(window_days, &process_key, &task_keys)
            })
            .await?;
        tracing::debug!(tasks = tasks.len(), "Fetched tasks for timeout check");

        let mut unclaimed = Vec::new();
        let mut unfinished = Vec::new();

        for task in tasks {
            let category = task.classification;
            let (timeout, breaching) = match category {
                Classification::Unclaimed => (self.config.unclaimed_timeout(), &mut unclaimed),
                Classification::Unfinished => (self.config.unfinished_timeout(), &mut unfinished),
            };

            if !task.is_breached(now, timeout) {
                continue;
            }

            self.state.registry().record(&task, category);
            if self.state.first_breach(category, &task.id) {
                match category {
                    Classification::Unclaimed => self.metrics.increment_unclaimed_total(1),
                    Classification::Unfinished => self.metrics.increment_unfinished_total(1),
                }
            }

            tracing::debug!(
                task_id = %task.id,
                created_at = %task.created_at.format(TIMESTAMP_FORMAT),
                category = %category,
                "Task past SLA"
            );
            breaching.push(task);
        }

        Ok((unclaimed, unfinished))
    }

    /// Send one batched alert for the breaching tasks out of cooldown.
    /// Returns how many tasks it covered.
    async fn alert_breaches(
        &self,
        category: Classification,
        breaching: &[TaskRecord],
        now: NaiveDateTime,
    ) -> usize {
        if breaching.is_empty() {
            return 0;
        }
        if !is_working_hours(now) {
            tracing::debug!(category = %category, tasks = breaching.len(), "Outside working hours, not alerting");
            return 0;
        }

        let cooldown = self.state.cooldown(category);
        let batch: Vec<&TaskRecord> = breaching
            .iter()
            .filter(|task| cooldown.eligible(&task.id, now))
            .collect();
        if batch.is_empty() {
            tracing::debug!(category = %category, "All breaching tasks are cooling down");
            return 0;
        }

        let task_ids = messages::format_task_ids(batch.iter().copied());
        let registry_total = self.state.registry().count(category);
        let (message, endpoint) = match category {
            Classification::Unclaimed => (
                messages::unclaimed_timeout(batch.len(), breaching.len(), registry_total, &task_ids),
                &self.config.channels.unclaimed,
            ),
            Classification::Unfinished => (
                messages::unfinished_timeout(batch.len(), breaching.len(), registry_total, &task_ids),
                &self.config.channels.unfinished,
            ),
        };

        match self.transport.post(&message, endpoint).await {
            Ok(_) => {
                cooldown.stamp(batch.iter().map(|task| task.id.as_str()), now);
                tracing::info!(category = %category, tasks = batch.len(), "Timeout alert sent");
                batch.len()
            }
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    tasks = batch.len(),
                    error = %e,
                    "Timeout alert not delivered"
                );
                0
            }
        }
    }

    fn snapshot_if_due(&self, now: NaiveDateTime) -> Result<bool, MonitorError> {
        if !self.state.snapshot_due(now, self.config.snapshot_interval()) {
            return Ok(false);
        }

        self.snapshot_now()?;
        self.state.mark_snapshot(now);
        Ok(true)
    }

    /// Post today's running onboarding count to the daily stats channel
    pub async fn send_onboarding_report(&self, now: NaiveDateTime) -> Result<Delivery, NotifierError> {
        let (total, new) = self.state.with_daily(|daily| daily.onboarding.progress());
        let message = messages::onboarding_progress(
            total,
            new,
            &now.format(TIMESTAMP_FORMAT).to_string(),
        );

        let delivery = self
            .transport
            .post(&message, &self.config.channels.daily_stats)
            .await?;
        self.state
            .with_daily(|daily| daily.onboarding.mark_reported(total));
        Ok(delivery)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Task source error: {0}")]
    Source(#[from] SourceError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
