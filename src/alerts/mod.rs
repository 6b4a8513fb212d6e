//! Alert delivery, templates, and per-task cooldown

pub mod cooldown;
pub mod messages;
pub mod notifier;

pub use cooldown::{is_eligible, CooldownTracker, DEFAULT_COOLDOWN_MINUTES};
pub use notifier::{AlertTransport, Delivery, NotifierError, WebhookNotifier};
