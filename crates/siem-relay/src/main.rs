//! OpenSASE SIEM Relay - Main Entry Point

use anyhow::Context;
use siem_relay::{Event, ForwardingManager, RelayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "OpenSASE SIEM Relay starting");

    // Load config
    let config = match std::env::var("SIEM_RELAY_CONFIG") {
        Ok(path) => RelayConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => RelayConfig::from_env().context("invalid SIEM environment configuration")?,
    };

    if !config.has_destinations() {
        tracing::warn!("No SIEM destinations configured, events will be discarded");
    }

    let manager = ForwardingManager::from_config(&config).context("failed to register sinks")?;

    if std::env::args().any(|arg| arg == "--test-event") {
        let event = Event::threat("SIEM Relay", "relay@opensase.local", 0.1, "SIEM relay test event")
            .indicator("test")
            .action_taken("none")
            .build();
        tracing::info!(event_id = %event.id(), "Queued test event");
        manager.enqueue(event);
    }

    if !manager.start() {
        anyhow::bail!("forwarding manager failed to start");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    manager.shutdown().await;

    let metrics = manager.metrics();
    tracing::info!(
        enqueued = metrics.events_enqueued,
        dropped = metrics.events_dropped,
        batches = metrics.batches_dispatched,
        delivered = metrics.events_delivered,
        failed = metrics.events_failed,
        "SIEM relay exited"
    );

    Ok(())
}
