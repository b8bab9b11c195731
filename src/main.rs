//! Churn Dashboard - Main Entry Point
//!
//! Loads the artifact set named in the configuration, computes explanations
//! once, and serves the dashboard until ctrl+c.

use anyhow::{Context, Result};
use churn_dashboard::{
    config::{AppConfig, LoggingConfig},
    metrics::DashboardMetrics,
    server::{run_server, AppState},
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?
            .add_directive("tower_http=warn".parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => AppConfig::load()?,
    };
    init_logging(&config.logging)?;

    info!("Starting Churn Dashboard");
    info!(
        model = %config.artifacts.model,
        x_train = %config.artifacts.x_train,
        x_test = %config.artifacts.x_test,
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(DashboardMetrics::new());
    let state = Arc::new(AppState::new(config, Arc::clone(&metrics)));

    // A broken artifact set is reported on every request instead of
    // preventing startup; the next request retries the load.
    if let Err(e) = state.warm_up() {
        error!(kind = e.kind(), error = %e, "Initial artifact load failed");
    }

    run_server(state).await?;

    metrics.print_summary();
    info!("Churn Dashboard stopped");
    Ok(())
}
