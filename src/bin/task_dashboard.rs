//! # Task Dashboard
//!
//! Serves the read-only JSON API over every configured namespace.
//!
//! ```bash
//! MASTER_POSTGRES_HOST=postgres-master SLAVE_POSTGRES_HOST=postgres-slave \
//!     cargo run --bin task-dashboard
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use tasker_executor::config::ConfigManager;
use tasker_executor::dashboard::{router, DashboardAggregator};
use tasker_executor::logging;
use tasker_executor::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> Result<()> {
    let manager = ConfigManager::load().context("Failed to load configuration")?;
    let config = manager.config();
    logging::init_structured_logging(&config.logging, manager.environment());

    let aggregator = Arc::new(DashboardAggregator::from_config(config));
    for namespace in &config.dashboard.namespaces {
        info!(namespace = %namespace.name, host = %namespace.host, "Dashboard namespace");
    }

    let listener = TcpListener::bind(&config.dashboard.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.dashboard.bind_address))?;
    info!(address = %config.dashboard.bind_address, "Dashboard listening");

    axum::serve(listener, router(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Dashboard server failed")?;

    info!("Dashboard stopped");
    Ok(())
}
