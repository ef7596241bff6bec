//! Connection management for the `tasks` store.
//!
//! The executor holds one dedicated [`PgConnection`] at a time and replaces it
//! after any failure. The dashboard and producers use small pools.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool, Row};
use std::time::Duration;
use tracing::debug;

use crate::config::DatabaseConfig;

/// Build connect options from the loaded configuration
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.username)
        .password(&config.password)
        .application_name("tasker-executor")
}

/// Open a single connection, bounded by `connect_timeout_ms`
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection, sqlx::Error> {
    debug!(url = %config.display_url(), "Opening database connection");
    connect_with_timeout(&connect_options(config), config.connect_timeout()).await
}

/// Open a single connection from prepared options
pub async fn connect_with_timeout(
    options: &PgConnectOptions,
    timeout: Duration,
) -> Result<PgConnection, sqlx::Error> {
    match tokio::time::timeout(timeout, options.connect()).await {
        Ok(result) => result,
        Err(_) => Err(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!(
                "connection to {}:{} timed out after {timeout:?}",
                options.get_host(),
                options.get_port()
            ),
        ))),
    }
}

/// Pooled access for the dashboard and producers
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Connect eagerly; fails if the server is unreachable
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = Self::pool_options(config)
            .connect_with(connect_options(config))
            .await?;
        Ok(Self { pool })
    }

    /// Create the pool without connecting; connections open on first use
    pub fn new_lazy(config: &DatabaseConfig) -> Self {
        let pool = Self::pool_options(config).connect_lazy_with(connect_options(config));
        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.pool_max_connections)
            .acquire_timeout(config.connect_timeout())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool, sqlx::Error> {
        health_check(&self.pool).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// `SELECT 1` against any executor
pub async fn health_check<'c, E>(executor: E) -> Result<bool, sqlx::Error>
where
    E: sqlx::PgExecutor<'c>,
{
    let row = sqlx::query("SELECT 1 AS health")
        .fetch_one(executor)
        .await?;
    let health: i32 = row.try_get("health")?;
    Ok(health == 1)
}

/// Close a dedicated connection, logging instead of failing if the peer is gone
pub async fn close_connection(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "Connection close did not complete cleanly");
    }
}
