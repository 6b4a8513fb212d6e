//! Background worker driving the check cycle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::checker::TaskMonitor;
use crate::persistence::PersistenceError;

/// Runs [`TaskMonitor::run_cycle`] on a fixed interval until stopped
///
/// Cycles never overlap: the next tick is only awaited once the current
/// cycle has returned. A cycle in progress runs to completion on shutdown.
pub struct MonitorWorker {
    monitor: Arc<TaskMonitor>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl MonitorWorker {
    pub fn new(monitor: Arc<TaskMonitor>) -> Self {
        Self {
            monitor,
            shutdown_tx: None,
        }
    }

    /// Start the background loop; the first cycle runs immediately
    pub fn start(&mut self, check_interval: Duration) -> JoinHandle<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let monitor = Arc::clone(&self.monitor);

        tokio::spawn(async move {
            tracing::info!("Monitor worker started with interval {:?}", check_interval);

            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_once(&monitor).await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Monitor worker shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the loop to exit after the current cycle
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Stop the loop, wait for it to exit, then write the registry out
    pub async fn shutdown(mut self, handle: JoinHandle<()>) -> Result<(), PersistenceError> {
        self.stop().await;
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Monitor worker did not exit cleanly");
        }

        self.monitor.snapshot_now()?;
        tracing::info!("Final snapshot written");
        Ok(())
    }
}

/// One cycle at local wall-clock time; failures are logged, never propagated
pub async fn run_once(monitor: &TaskMonitor) {
    let now = chrono::Local::now().naive_local();
    tracing::debug!("Checking tasks at {}", now);

    match monitor.run_cycle(now).await {
        Ok(report) => tracing::debug!(?report, "Check cycle complete"),
        Err(e) => tracing::error!(error = %e, "Check cycle failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertTransport, Delivery, NotifierError};
    use crate::config::{MonitorConfig, DEFAULT_PROCESS_KEY, DEFAULT_TASK_KEYS};
    use crate::data::{Classification, TaskRecord};
    use crate::metrics::MonitorMetrics;
    use crate::source::MemoryTaskSource;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NullTransport;

    #[async_trait]
    impl AlertTransport for NullTransport {
        async fn post(&self, _message: &str, _endpoint: &str) -> Result<Delivery, NotifierError> {
            Ok(Delivery::Skipped)
        }
    }

    fn monitor(dir: &TempDir, source: Arc<MemoryTaskSource>) -> Arc<TaskMonitor> {
        let now = chrono::Local::now().naive_local();
        Arc::new(TaskMonitor::new(
            MonitorConfig::default().with_persist_dir(dir.path()),
            source,
            Arc::new(NullTransport),
            MonitorMetrics::new().unwrap(),
            now,
        ))
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let today = chrono::Local::now().date_naive();
        let monitor = monitor(&dir, Arc::new(MemoryTaskSource::new(today)));

        let mut worker = MonitorWorker::new(monitor);
        let handle = worker.start(Duration::from_millis(10));
        assert!(worker.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.stop().await;
        assert!(!worker.is_running());

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_failing_cycles_keep_the_loop_alive() {
        let dir = TempDir::new().unwrap();
        let today = chrono::Local::now().date_naive();
        let source = Arc::new(MemoryTaskSource::new(today));
        source.set_unavailable(true);

        let mut worker = MonitorWorker::new(monitor(&dir, source.clone()));
        let handle = worker.start(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        worker.stop().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_writes_final_snapshot() {
        let dir = TempDir::new().unwrap();
        let now = chrono::Local::now().naive_local();
        let source = Arc::new(MemoryTaskSource::new(now.date()));
        source.upsert(
            TaskRecord::new("T1", now - chrono::Duration::hours(1), Classification::Unclaimed),
            DEFAULT_PROCESS_KEY,
            DEFAULT_TASK_KEYS[0],
        );
        let monitor = monitor(&dir, source);

        // Breach recorded well inside the periodic snapshot interval
        let report = monitor.run_cycle(now).await.unwrap();
        assert_eq!(report.unclaimed_breaching, 1);
        assert!(!report.snapshot_written);
        let path = dir.path().join("timeout_tasks.json");
        assert!(!path.exists());

        let mut worker = MonitorWorker::new(Arc::clone(&monitor));
        let handle = worker.start(Duration::from_secs(3600));
        worker.shutdown(handle).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("T1"));
    }
}
