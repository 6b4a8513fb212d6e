//! Day rollover and onboarding counters

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::data::{TaskRecord, DATE_FORMAT};

/// Archived daily counts older than this many days are dropped
const ARCHIVE_RETENTION_DAYS: i64 = 7;

/// Result of feeding the current date to a [`DayTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTransition {
    SameDay,
    /// A new day began. `previous` is `None` on the first observation.
    RolledOver { previous: Option<NaiveDate> },
}

/// Single source of truth for "has the day changed"
#[derive(Debug, Default)]
pub struct DayTracker {
    current: Option<NaiveDate>,
}

impl DayTracker {
    pub fn observe(&mut self, today: NaiveDate) -> DayTransition {
        match self.current {
            Some(day) if day == today => DayTransition::SameDay,
            previous => {
                self.current = Some(today);
                DayTransition::RolledOver { previous }
            }
        }
    }

    pub fn current(&self) -> Option<NaiveDate> {
        self.current
    }
}

/// Distinct onboarding tasks seen per day
///
/// Tasks vanish from the source once completed, so ids are remembered for the
/// rest of the day to keep the running count cumulative.
#[derive(Debug, Default)]
pub struct OnboardingStats {
    day: Option<NaiveDate>,
    running: u64,
    counted: HashSet<String>,
    last_stats_at: Option<NaiveDateTime>,
    last_reported: u64,
    archive: BTreeMap<NaiveDate, u64>,
}

impl OnboardingStats {
    /// Archive the previous day's count (if there was one) and start `today` from zero
    pub fn roll_over(&mut self, previous: Option<NaiveDate>, today: NaiveDate) {
        if let Some(previous) = previous {
            self.archive(previous, self.running);
            tracing::info!(
                date = %previous.format(DATE_FORMAT),
                count = self.running,
                "Archived onboarding count for previous day"
            );
        }

        self.day = Some(today);
        self.running = 0;
        self.last_reported = 0;
        self.counted.clear();
        tracing::info!(date = %today.format(DATE_FORMAT), "New day, onboarding count reset");
    }

    fn archive(&mut self, date: NaiveDate, count: u64) {
        self.archive.insert(date, count);
        let cutoff = date - Duration::days(ARCHIVE_RETENTION_DAYS);
        self.archive.retain(|day, _| *day > cutoff);
    }

    /// Count every id not seen yet today. Returns how many were new.
    pub fn absorb<'a, I>(&mut self, ids: I, now: NaiveDateTime) -> u64
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut new = 0;
        for id in ids {
            if self.counted.insert(id.to_string()) {
                new += 1;
            }
        }

        if new > 0 {
            self.running += new;
            self.last_stats_at = Some(now);
        }
        new
    }

    pub fn running(&self) -> u64 {
        self.running
    }

    pub fn last_stats_at(&self) -> Option<NaiveDateTime> {
        self.last_stats_at
    }

    pub fn archived(&self, date: NaiveDate) -> Option<u64> {
        self.archive.get(&date).copied()
    }

    /// Finalized count for `date`, used by the morning report
    ///
    /// When nothing (or zero) was archived and the running count still belongs
    /// to a day other than `today`, that count is archived under `date` and
    /// returned. Otherwise reports 0.
    pub fn finalized_count(&mut self, date: NaiveDate, today: NaiveDate) -> u64 {
        let archived = self.archived(date).unwrap_or(0);
        if archived > 0 {
            return archived;
        }

        if self.running > 0 && matches!(self.day, Some(day) if day != today) {
            let count = self.running;
            self.archive(date, count);
            tracing::info!(
                date = %date.format(DATE_FORMAT),
                count,
                "Onboarding count was not archived at rollover, saved it late"
            );
            return count;
        }

        tracing::warn!(
            date = %date.format(DATE_FORMAT),
            "No onboarding count archived, reporting 0"
        );
        0
    }

    /// Running count and how much it grew since the previous progress report
    pub fn progress(&self) -> (u64, u64) {
        (self.running, self.running.saturating_sub(self.last_reported))
    }

    pub fn mark_reported(&mut self, count: u64) {
        self.last_reported = count;
    }
}

/// Everything that turns over once per day
#[derive(Debug, Default)]
pub struct DailyState {
    tracker: DayTracker,
    report_done: bool,
    pub onboarding: OnboardingStats,
}

impl DailyState {
    /// Evaluate the day transition once per cycle and apply its effects
    pub fn begin_cycle(&mut self, today: NaiveDate) -> DayTransition {
        let transition = self.tracker.observe(today);
        if let DayTransition::RolledOver { previous } = transition {
            self.report_done = false;
            self.onboarding.roll_over(previous, today);
        }
        transition
    }

    /// The morning report runs once, between 09:00 and 09:05
    pub fn report_due(&self, now: NaiveDateTime) -> bool {
        now.hour() == 9 && now.minute() < 5 && !self.report_done
    }

    pub fn mark_report_done(&mut self) {
        self.report_done = true;
    }

    pub fn report_done(&self) -> bool {
        self.report_done
    }
}

/// Unfinished timeouts created in the 24h before `now`, during business hours (09:00-20:59)
pub fn count_business_hour_timeouts<'a, I>(tasks: I, now: NaiveDateTime) -> usize
where
    I: IntoIterator<Item = &'a TaskRecord>,
{
    let since = now - Duration::hours(24);
    tasks
        .into_iter()
        .filter(|task| task.created_at < now && task.created_at > since)
        .filter(|task| {
            let hour = task.created_at.hour();
            hour > 8 && hour < 21
        })
        .count()
}
