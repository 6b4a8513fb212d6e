//! Prometheus counters for onboarding volume and SLA breaches

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Monotonic counters scraped from `/metrics`
///
/// Increments are non-negative by construction. Callers deduplicate breach
/// counts per task id before calling in.
#[derive(Clone)]
pub struct MonitorMetrics {
    registry: Registry,
    task_total: IntCounter,
    unclaimed_total: IntCounter,
    unfinished_total: IntCounter,
}

impl MonitorMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let task_total = IntCounter::with_opts(Opts::new(
            "task_total",
            "Distinct onboarding tasks seen",
        ))?;
        let unclaimed_total = IntCounter::with_opts(Opts::new(
            "unclaimed_total",
            "Distinct tasks that breached the unclaimed SLA",
        ))?;
        let unfinished_total = IntCounter::with_opts(Opts::new(
            "unfinished_total",
            "Distinct tasks that breached the unfinished SLA",
        ))?;

        registry.register(Box::new(task_total.clone()))?;
        registry.register(Box::new(unclaimed_total.clone()))?;
        registry.register(Box::new(unfinished_total.clone()))?;

        tracing::info!("Registered metrics: task_total, unclaimed_total, unfinished_total");

        Ok(Self {
            registry,
            task_total,
            unclaimed_total,
            unfinished_total,
        })
    }

    pub fn increment_task_total(&self, count: u64) {
        self.task_total.inc_by(count);
    }

    pub fn increment_unclaimed_total(&self, count: u64) {
        self.unclaimed_total.inc_by(count);
    }

    pub fn increment_unfinished_total(&self, count: u64) {
        self.unfinished_total.inc_by(count);
    }

    pub fn task_total(&self) -> u64 {
        self.task_total.get()
    }

    pub fn unclaimed_total(&self) -> u64 {
        self.unclaimed_total.get()
    }

    pub fn unfinished_total(&self) -> u64 {
        self.unfinished_total.get()
    }

    /// Render all counters in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = MonitorMetrics::new().unwrap();
        metrics.increment_task_total(3);
        metrics.increment_task_total(2);
        metrics.increment_unclaimed_total(1);
        metrics.increment_unfinished_total(0);

        assert_eq!(metrics.task_total(), 5);
        assert_eq!(metrics.unclaimed_total(), 1);
        assert_eq!(metrics.unfinished_total(), 0);
    }

    #[test]
    fn test_encode_text_format() {
        let metrics = MonitorMetrics::new().unwrap();
        metrics.increment_unclaimed_total(4);

        let text = metrics.encode().unwrap();
        assert!(text.contains("# TYPE unclaimed_total counter"));
        assert!(text.contains("unclaimed_total 4"));
        assert!(text.contains("task_total 0"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = MonitorMetrics::new().unwrap();
        let b = MonitorMetrics::new().unwrap();
        a.increment_task_total(1);
        assert_eq!(b.task_total(), 0);
    }
}
