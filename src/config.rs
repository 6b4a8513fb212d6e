//! Runtime configuration, read from environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `TASK_TIMEOUT_MINUTES` | 3 |
//! | `UNFINISHED_TIMEOUT_MINUTES` | 10 |
//! | `CHECK_INTERVAL_SECONDS` | 60 |
//! | `UNCLAIMED_WEBHOOK`, `UNFINISHED_WEBHOOK`, `DAILY_STATS_WEBHOOK` | empty (disabled) |
//! | `PERSIST_PATH` | `.` |
//! | `MERCHWATCH_HOST` / `MERCHWATCH_PORT` | `0.0.0.0` / 8080 |
//! | `TASK_DB_PATH` | `tasks.db` |
//! | `PROCESS_KEY` | `ACT_MERCH_ACCESS_REGISTER` |
//! | `TASK_KEYS` | `LICENSE_MASTER_NEW_CHECK_TASK,PERSON_MASTER_NEW_CHECK_TASK` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Duration as TimeDelta;

pub const DEFAULT_PROCESS_KEY: &str = "ACT_MERCH_ACCESS_REGISTER";
pub const DEFAULT_TASK_KEYS: [&str; 2] = [
    "LICENSE_MASTER_NEW_CHECK_TASK",
    "PERSON_MASTER_NEW_CHECK_TASK",
];

/// Webhook endpoint per alert channel; empty disables the channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertChannels {
    pub unclaimed: String,
    pub unfinished: String,
    pub daily_stats: String,
}

/// Monitor and server configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub unclaimed_timeout_minutes: u32,
    pub unfinished_timeout_minutes: u32,
    pub check_interval_secs: u64,
    /// How many days back the timeout scan looks
    pub scan_window_days: u32,
    pub alert_cooldown_minutes: u32,
    pub snapshot_interval_minutes: u32,
    pub channels: AlertChannels,
    pub persist_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub task_db_path: PathBuf,
    pub process_key: String,
    pub task_keys: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            unclaimed_timeout_minutes: 3,
            unfinished_timeout_minutes: 10,
            check_interval_secs: 60,
            scan_window_days: 6,
            alert_cooldown_minutes: 10,
            snapshot_interval_minutes: 10,
            channels: AlertChannels::default(),
            persist_dir: PathBuf::from("."),
            host: "0.0.0.0".to_string(),
            port: 8080,
            task_db_path: PathBuf::from("tasks.db"),
            process_key: DEFAULT_PROCESS_KEY.to_string(),
            task_keys: DEFAULT_TASK_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl MonitorConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            unclaimed_timeout_minutes: parse_or(&get, "TASK_TIMEOUT_MINUTES", defaults.unclaimed_timeout_minutes)?,
            unfinished_timeout_minutes: parse_or(&get, "UNFINISHED_TIMEOUT_MINUTES", defaults.unfinished_timeout_minutes)?,
            check_interval_secs: parse_or(&get, "CHECK_INTERVAL_SECONDS", defaults.check_interval_secs)?,
            channels: AlertChannels {
                unclaimed: get("UNCLAIMED_WEBHOOK").unwrap_or_default(),
                unfinished: get("UNFINISHED_WEBHOOK").unwrap_or_default(),
                daily_stats: get("DAILY_STATS_WEBHOOK").unwrap_or_default(),
            },
            persist_dir: get("PERSIST_PATH").map(PathBuf::from).unwrap_or(defaults.persist_dir),
            host: get("MERCHWATCH_HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "MERCHWATCH_PORT", defaults.port)?,
            task_db_path: get("TASK_DB_PATH").map(PathBuf::from).unwrap_or(defaults.task_db_path),
            process_key: get("PROCESS_KEY").unwrap_or(defaults.process_key),
            task_keys: get("TASK_KEYS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.task_keys),
            scan_window_days: defaults.scan_window_days,
            alert_cooldown_minutes: defaults.alert_cooldown_minutes,
            snapshot_interval_minutes: defaults.snapshot_interval_minutes,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("TASK_TIMEOUT_MINUTES", u64::from(self.unclaimed_timeout_minutes)),
            ("UNFINISHED_TIMEOUT_MINUTES", u64::from(self.unfinished_timeout_minutes)),
            ("CHECK_INTERVAL_SECONDS", self.check_interval_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.task_keys.is_empty() {
            return Err(ConfigError::Invalid {
                key: "TASK_KEYS".to_string(),
                reason: "at least one task key is required".to_string(),
            });
        }

        Ok(())
    }

    pub fn with_unclaimed_timeout(mut self, minutes: u32) -> Self {
        self.unclaimed_timeout_minutes = minutes;
        self
    }

    pub fn with_unfinished_timeout(mut self, minutes: u32) -> Self {
        self.unfinished_timeout_minutes = minutes;
        self
    }

    pub fn with_channels(mut self, channels: AlertChannels) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = dir.into();
        self
    }

    pub fn with_task_keys(mut self, process_key: &str, task_keys: &[&str]) -> Self {
        self.process_key = process_key.to_string();
        self.task_keys = task_keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn unclaimed_timeout(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.unclaimed_timeout_minutes))
    }

    pub fn unfinished_timeout(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.unfinished_timeout_minutes))
    }

    pub fn alert_cooldown(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.alert_cooldown_minutes))
    }

    pub fn snapshot_interval(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.snapshot_interval_minutes))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("{:?}: {}", raw, e),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
