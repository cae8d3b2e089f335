//! Splunk Event Collector — periodically dispatches saved searches against
//! one or more Splunk-compatible endpoints, manages per-search temporal
//! cursors, and forwards collected events downstream.

mod cli;

use anyhow::Result;
use splunk_event_collector::clock::SystemClock;
use splunk_event_collector::config::AppConfig;
use splunk_event_collector::dispatch::HttpDispatcher;
use splunk_event_collector::driver::CheckDriver;
use splunk_event_collector::health::LoggingHealthReporter;
use splunk_event_collector::http::build_client;
use splunk_event_collector::registry::HttpSavedSearchLister;
use splunk_event_collector::scheduler;
use splunk_event_collector::sink::LoggingSink;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI commands first (config --show, --reset, --edit, --path).
    // If a command was handled, exit early.
    if cli::handle_cli() {
        return Ok(());
    }

    // Ensure a config template exists (helps operators discover options).
    AppConfig::ensure_config_exists();

    let config = AppConfig::from_env()?;

    // Precedence: RUST_LOG env var > default "info".
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "splunk_event_collector=info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        instances = config.instances.len(),
        collection_interval_seconds = config.collection_interval_seconds,
        "starting splunk-event-collector"
    );

    if config.instances.is_empty() {
        tracing::warn!("no instances configured; nothing to collect. Run `splunk-event-collector config --path` to find the config file.");
    }

    let mut drivers = Vec::with_capacity(config.instances.len());
    for instance in config.instances {
        let client = build_client(
            instance.defaults.request_timeout_seconds,
            instance.defaults.verify_ssl_certificate,
        )?;
        let driver = CheckDriver::new(
            instance,
            Box::new(HttpSavedSearchLister {
                client: client.clone(),
            }),
            Box::new(HttpDispatcher {
                client: client.clone(),
            }),
            Box::new(LoggingSink),
            Box::new(LoggingHealthReporter),
            Box::new(SystemClock),
        );
        drivers.push(driver);
    }

    scheduler::run(drivers, config.collection_interval_seconds).await;

    tracing::info!("shutdown complete");
    Ok(())
}
