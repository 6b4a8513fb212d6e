//! SLA monitoring: the periodic check cycle and the state it keeps

pub mod checker;
pub mod daily;
pub mod state;
pub mod worker;

pub use checker::{is_working_hours, CycleReport, MonitorError, TaskMonitor};
pub use daily::{DailyState, DayTracker, DayTransition, OnboardingStats};
pub use state::MonitorState;
pub use worker::MonitorWorker;
