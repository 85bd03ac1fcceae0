//! Provisioner service
//!
//! Consumes application lifecycle events from the bus and provisions or tears
//! down the per-application observability resource set.
//!
//! Run with: cargo run --bin provisioner
//!
//! Required environment: INFLUXDB_ADMIN_TOKEN. See `ServiceConfig::from_env`
//! for the remaining settings and their defaults.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use neb_provisioner::{
    BusDeadLetterSink, ConsumerHandle, ConsumerLoop, Counters, HttpResourceClient,
    MessageIngestor, MessageRouter, MetricsCounters, ProvisioningOrchestrator, StateStore,
    TemplateSet,
};
use neb_provisioner::config::ServiceConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting provisioner service");

    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded:");
    info!("  - Broker URL: {}", config.bus.url);
    info!("  - Topic: {}", config.bus.topic);
    info!("  - Backend URL: {}", config.backend.base_url);
    info!("  - Organization: {}", config.org_name);
    info!("  - State dir: {}", config.state_dir.display());

    let backend = HttpResourceClient::new(config.backend.clone())
        .context("Failed to create resource client")?;
    backend
        .health_check()
        .await
        .context("Resource backend health check failed")?;
    info!("Resource backend reachable");

    let templates = TemplateSet::load(&config.dashboard_template, &config.charts_template)
        .context("Failed to load dashboard templates")?;

    let orchestrator = ProvisioningOrchestrator::new(
        Arc::new(backend),
        config.org_name.clone(),
        config.scraper_target_url.clone(),
        templates,
        StateStore::new(config.state_dir.clone()),
    );
    let router = MessageRouter::new(orchestrator);

    let counters: Arc<dyn Counters> = Arc::new(MetricsCounters);
    let health_counters = counters.clone();

    let ingestor = MessageIngestor::connect(
        config.bus.clone(),
        Arc::new(move |health| health_counters.connection(health)),
    )
    .await
    .context("Failed to connect to bus")?;

    let dead_letters = Arc::new(BusDeadLetterSink::new(ingestor.client(), ingestor.topic()));

    let (tx, rx) = mpsc::unbounded_channel();
    let consumer = ConsumerLoop::new(router, counters, dead_letters).spawn(rx);
    let handle = ConsumerHandle::new(tx.clone(), consumer);

    info!("Provisioner running, press Ctrl+C to exit");
    tokio::select! {
        result = ingestor.run(tx) => {
            result.context("Ingestion loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    // Cooperative shutdown: sentinel, drain the consumer, then disconnect.
    handle.shutdown().await;
    ingestor.disconnect().await;
    info!("Provisioner stopped");

    Ok(())
}
