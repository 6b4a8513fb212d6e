//! Merchwatch Server
//!
//! Run with: cargo run
//!
//! Configuration comes from the environment; see [`merchwatch::config`] for
//! the full list. `RUST_LOG` controls log levels (default: info).

use merchwatch::api::run_server;
use merchwatch::config::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merchwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env()?;

    tracing::info!("Merchwatch configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Task database: {}", config.task_db_path.display());
    tracing::info!("  Process key: {}", config.process_key);
    tracing::info!("  Task keys: {}", config.task_keys.join(", "));
    tracing::info!(
        "  Unclaimed timeout: {} minutes",
        config.unclaimed_timeout_minutes
    );
    tracing::info!(
        "  Unfinished timeout: {} minutes",
        config.unfinished_timeout_minutes
    );
    tracing::info!("  Check interval: {} seconds", config.check_interval_secs);
    tracing::info!("  Snapshot directory: {}", config.persist_dir.display());

    for (name, url) in [
        ("unclaimed", &config.channels.unclaimed),
        ("unfinished", &config.channels.unfinished),
        ("daily stats", &config.channels.daily_stats),
    ] {
        if url.is_empty() {
            tracing::warn!("  Alert channel {}: DISABLED (no webhook)", name);
        } else {
            tracing::info!("  Alert channel {}: configured", name);
        }
    }

    run_server(config).await
}
