//! Conference background worker.
//!
//! Consumes queued jobs, refreshes the "nearly sold out" announcement on a
//! schedule, and exports Prometheus metrics until interrupted.

use conference_runtime::metrics::MetricsServer;
use conference_server::{Backends, ConferenceApp, Config};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(backend = ?config.backend, "Starting conference server");

    let mut metrics = MetricsServer::new(config.metrics_addr());
    metrics.start()?;

    let backends = Backends::from_config(&config).await?;
    let app = ConferenceApp::new(backends, &config);

    let (shutdown, _) = broadcast::channel(1);
    let running = app.spawn(&shutdown);
    info!(
        interval_secs = config.jobs.announcement_interval_secs,
        "Worker and announcement scheduler running"
    );

    signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping background tasks...");
    let _ = shutdown.send(());

    running.join(config.shutdown_timeout()).await?;
    info!("Server shutdown complete");
    Ok(())
}
