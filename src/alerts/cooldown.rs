//! Per-task alert cooldown

use chrono::{Duration, NaiveDateTime};
use dashmap::DashMap;

/// Minimum gap between two alerts for the same task
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 10;

/// A task may alert if it never has, or its last alert is strictly older than `threshold`
pub fn is_eligible(last_alert: Option<NaiveDateTime>, now: NaiveDateTime, threshold: Duration) -> bool {
    match last_alert {
        None => true,
        Some(last) => now > last + threshold,
    }
}

/// Last-alert timestamps for one alert category
///
/// Entries live for the process lifetime and are overwritten when the same
/// task alerts again.
#[derive(Debug)]
pub struct CooldownTracker {
    last_alert: DashMap<String, NaiveDateTime>,
    threshold: Duration,
}

impl CooldownTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_alert: DashMap::new(),
            threshold,
        }
    }

    pub fn eligible(&self, task_id: &str, now: NaiveDateTime) -> bool {
        is_eligible(self.last_alert(task_id), now, self.threshold)
    }

    /// Record that `task_ids` were included in an alert sent at `now`
    pub fn stamp<'a, I>(&self, task_ids: I, now: NaiveDateTime)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in task_ids {
            self.last_alert.insert(id.to_string(), now);
        }
    }

    pub fn last_alert(&self, task_id: &str) -> Option<NaiveDateTime> {
        self.last_alert.get(task_id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.last_alert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert.is_empty()
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_is_eligible() {
        let threshold = Duration::minutes(10);
        assert!(is_eligible(None, at(10, 0), threshold));
        assert!(!is_eligible(Some(at(10, 5)), at(10, 7), threshold));
        assert!(!is_eligible(Some(at(10, 5)), at(10, 15), threshold));
        assert!(is_eligible(Some(at(10, 5)), at(10, 16), threshold));
    }

    #[test]
    fn test_suppressed_tasks_keep_their_window() {
        let tracker = CooldownTracker::default();
        assert!(tracker.is_empty());
        tracker.stamp(["T1"], at(10, 5));

        // T1 is suppressed at 10:07 and must not be restamped, so it is due again at 10:16
        assert!(!tracker.eligible("T1", at(10, 7)));
        assert!(tracker.eligible("T2", at(10, 7)));
        tracker.stamp(["T2"], at(10, 7));

        assert!(tracker.eligible("T1", at(10, 16)));
        assert!(!tracker.eligible("T2", at(10, 16)));
        assert_eq!(tracker.last_alert("T1"), Some(at(10, 5)));
        assert_eq!(tracker.len(), 2);
    }
}
