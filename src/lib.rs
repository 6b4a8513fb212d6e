//! Merchwatch: SLA monitor for the merchant onboarding review queue
//!
//! Polls a workflow task store on a fixed interval and raises group-chat
//! alerts for review tasks that breach their SLA.
//!
//! # Features
//!
//! - **Unclaimed timeouts**: tasks nobody picked up within the allowed window
//! - **Unfinished timeouts**: tasks picked up but not completed in time
//! - **Alert cooldown**: at most one alert per task and category every 10 minutes
//! - **Working hours**: alerts only go out between 09:00 and 21:00 local time
//! - **Daily report**: yesterday's onboarding volume and timeouts, sent at 09:00
//! - **Snapshots**: the timeout registry survives restarts via two JSON files
//! - **Metrics**: Prometheus counters at `/metrics`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use merchwatch::alerts::WebhookNotifier;
//! use merchwatch::config::MonitorConfig;
//! use merchwatch::metrics::MonitorMetrics;
//! use merchwatch::monitor::TaskMonitor;
//! use merchwatch::source::SqliteTaskSource;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::from_env()?;
//! let monitor = TaskMonitor::new(
//!     config.clone(),
//!     Arc::new(SqliteTaskSource::open(&config.task_db_path)?),
//!     Arc::new(WebhookNotifier::new()?),
//!     MonitorMetrics::new()?,
//!     chrono::Local::now().naive_local(),
//! );
//!
//! let report = monitor.run_cycle(chrono::Local::now().naive_local()).await?;
//! println!("Cycle: {:?}", report);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod data;
pub mod metrics;
pub mod monitor;
pub mod persistence;
pub mod registry;
pub mod source;

// Re-export commonly used types
pub use config::{ConfigError, MonitorConfig};
pub use data::{Classification, TaskRecord};
pub use monitor::{CycleReport, MonitorError, TaskMonitor};
