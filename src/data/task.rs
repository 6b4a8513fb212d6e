//! Task records as reported by the workflow store

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Wall-clock format used for task timestamps on disk and in API responses
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used for daily archive keys and report headers
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which SLA a task can breach, derived from whether it has an assignee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Nobody has picked the task up yet
    Unclaimed,
    /// Picked up, not completed
    Unfinished,
}

impl Classification {
    pub const ALL: [Classification; 2] = [Classification::Unclaimed, Classification::Unfinished];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Unclaimed => "unclaimed",
            Classification::Unfinished => "unfinished",
        }
    }

    /// Parse the tag produced by the task store
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim() {
            "unclaimed" => Some(Classification::Unclaimed),
            "unfinished" => Some(Classification::Unfinished),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outstanding task instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "taskId")]
    pub id: String,
    #[serde(rename = "createTime", with = "timestamp_serde")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "type")]
    pub classification: Classification,
}

impl TaskRecord {
    pub fn new(
        id: impl Into<String>,
        created_at: NaiveDateTime,
        classification: Classification,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            classification,
        }
    }

    /// True once `now` is strictly past `created_at + timeout`
    pub fn is_breached(&self, now: NaiveDateTime, timeout: Duration) -> bool {
        now > self.created_at + timeout
    }
}

/// Serializes timestamps as `yyyy-MM-dd HH:mm:ss`
mod timestamp_serde {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
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
    fn test_breach_is_strict() {
        let task = TaskRecord::new("T1", at(10, 0), Classification::Unclaimed);
        let timeout = Duration::minutes(3);

        assert!(!task.is_breached(at(10, 3), timeout));
        assert!(task.is_breached(at(10, 5), timeout));
    }

    #[test]
    fn test_json_shape() {
        let task = TaskRecord::new("T1", at(10, 0), Classification::Unfinished);
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["taskId"], "T1");
        assert_eq!(json["createTime"], "2026-03-10 10:00:00");
        assert_eq!(json["type"], "unfinished");
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let raw = r#"{"taskId":"T1","createTime":"yesterday","type":"unclaimed"}"#;
        assert!(serde_json::from_str::<TaskRecord>(raw).is_err());
    }

    #[test]
    fn test_classification_parse() {
        assert_eq!(Classification::parse("unclaimed"), Some(Classification::Unclaimed));
        assert_eq!(Classification::parse(" unfinished "), Some(Classification::Unfinished));
        assert_eq!(Classification::parse("done"), None);
    }
}
