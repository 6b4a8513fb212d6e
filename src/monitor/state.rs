//! Shared monitor state

use chrono::{Duration, NaiveDate, NaiveDateTime};
use dashmap::DashSet;
use parking_lot::{Mutex, RwLock};

use super::daily::{DailyState, DayTransition};
use crate::alerts::CooldownTracker;
use crate::data::Classification;
use crate::registry::TimeoutRegistry;

/// Everything the check cycle mutates, shared with the HTTP handlers
pub struct MonitorState {
    registry: TimeoutRegistry,
    unclaimed_cooldown: CooldownTracker,
    unfinished_cooldown: CooldownTracker,
    /// Ids already counted toward the breach metrics; survives the daily clear
    counted_unclaimed: DashSet<String>,
    counted_unfinished: DashSet<String>,
    daily: RwLock<DailyState>,
    last_snapshot: Mutex<NaiveDateTime>,
}

impl MonitorState {
    pub fn new(cooldown: Duration, started_at: NaiveDateTime) -> Self {
        Self {
            registry: TimeoutRegistry::new(),
            unclaimed_cooldown: CooldownTracker::new(cooldown),
            unfinished_cooldown: CooldownTracker::new(cooldown),
            counted_unclaimed: DashSet::new(),
            counted_unfinished: DashSet::new(),
            daily: RwLock::new(DailyState::default()),
            last_snapshot: Mutex::new(started_at),
        }
    }

    pub fn registry(&self) -> &TimeoutRegistry {
        &self.registry
    }

    pub fn cooldown(&self, category: Classification) -> &CooldownTracker {
        match category {
            Classification::Unclaimed => &self.unclaimed_cooldown,
            Classification::Unfinished => &self.unfinished_cooldown,
        }
    }

    /// True the first time `task_id` breaches `category` in this process
    pub fn first_breach(&self, category: Classification, task_id: &str) -> bool {
        let counted = match category {
            Classification::Unclaimed => &self.counted_unclaimed,
            Classification::Unfinished => &self.counted_unfinished,
        };
        counted.insert(task_id.to_string())
    }

    pub fn begin_day(&self, today: NaiveDate) -> DayTransition {
        self.daily.write().begin_cycle(today)
    }

    /// Run `f` with exclusive access to the daily counters
    pub fn with_daily<R>(&self, f: impl FnOnce(&mut DailyState) -> R) -> R {
        f(&mut *self.daily.write())
    }

    pub fn daily_report_due(&self, now: NaiveDateTime) -> bool {
        self.daily.read().report_due(now)
    }

    pub fn today_count(&self) -> u64 {
        self.daily.read().onboarding.running()
    }

    pub fn last_stats_at(&self) -> Option<NaiveDateTime> {
        self.daily.read().onboarding.last_stats_at()
    }

    /// Strictly more than `interval` since the last snapshot
    pub fn snapshot_due(&self, now: NaiveDateTime, interval: Duration) -> bool {
        now - *self.last_snapshot.lock() > interval
    }

    pub fn mark_snapshot(&self, now: NaiveDateTime) {
        *self.last_snapshot.lock() = now;
    }

    pub fn last_snapshot(&self) -> NaiveDateTime {
        *self.last_snapshot.lock()
    }
}
