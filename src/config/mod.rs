//! # Executor Configuration
//!
//! All connection parameters and timings are collected into a single immutable
//! [`TaskerExecutorConfig`] at startup and handed to the components that need
//! them. After loading, only the log filter still looks at the process
//! environment (`RUST_LOG`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_executor::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let polling = &manager.config().executor;
//! println!("polling every {:?}", polling.poll_interval());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::constants::timing;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/tasker-executor.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskerExecutorConfig {
    /// Task store used by the executor and the producer
    pub database: DatabaseConfig,

    /// Polling loop timings
    pub executor: PollingConfig,

    /// Read-only dashboard settings
    pub dashboard: DashboardConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl TaskerExecutorConfig {
    /// Validate the loaded configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.database.validate("database")?;
        self.executor.validate()?;
        self.dashboard.validate()?;
        Ok(())
    }

    /// Database settings for a dashboard namespace: shared credentials, own host.
    pub fn namespace_database(&self, namespace: &NamespaceConfig) -> DatabaseConfig {
        DatabaseConfig {
            host: namespace.host.clone(),
            ..self.database.clone()
        }
    }

    /// JSON view of the configuration with credentials masked
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self);
        if let Some(password) = value.pointer_mut("/database/password") {
            *password = serde_json::Value::String(mask_secret(&self.database.password));
        }
        value
    }
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "[EMPTY]".to_string()
    } else {
        "[MASKED]".to_string()
    }
}

/// PostgreSQL connection settings
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub connect_timeout_ms: u64,
    /// Pool size for read-only consumers (dashboard, producer)
    pub pool_max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "taskdb".to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            connect_timeout_ms: timing::DEFAULT_CONNECT_TIMEOUT_MS,
            pool_max_connections: 5,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("pool_max_connections", &self.pool_max_connections)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Connection URL with the password masked, for log output
    pub fn display_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username,
            mask_secret(&self.password),
            self.host,
            self.port,
            self.database
        )
    }

    fn validate(&self, context: &str) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("host", context));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database", context,
            ));
        }
        if self.port == 0 {
            return Err(ConfigurationError::invalid_value(
                "port",
                "0",
                "port must be between 1 and 65535",
            ));
        }
        if self.pool_max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "pool_max_connections",
                "0",
                "at least one connection is required",
            ));
        }
        Ok(())
    }
}

/// Polling loop timings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait after every poll cycle
    pub poll_interval_ms: u64,
    /// Pause between two tasks of the same batch
    pub inter_task_delay_ms: u64,
    /// Wait between a store failure and the next connection attempt
    pub reconnect_delay_ms: u64,
    /// Optional grace period before the first connection attempt
    pub startup_delay_ms: u64,
    /// Upper bound on a single store call (connect, fetch, complete, close)
    pub operation_timeout_ms: u64,
    /// Create the `tasks` table on connect if it does not exist
    pub ensure_schema: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: timing::DEFAULT_POLL_INTERVAL_MS,
            inter_task_delay_ms: timing::DEFAULT_INTER_TASK_DELAY_MS,
            reconnect_delay_ms: timing::DEFAULT_RECONNECT_DELAY_MS,
            startup_delay_ms: 0,
            operation_timeout_ms: timing::DEFAULT_OPERATION_TIMEOUT_MS,
            ensure_schema: true,
        }
    }
}

impl PollingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn inter_task_delay(&self) -> Duration {
        Duration::from_millis(self.inter_task_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.poll_interval_ms",
                "0",
                "a zero poll interval would spin against the store",
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.reconnect_delay_ms",
                "0",
                "reconnect attempts need a delay",
            ));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.operation_timeout_ms",
                "0",
                "every store call needs a time limit",
            ));
        }
        Ok(())
    }
}

/// One dashboard namespace: an independently reachable task store
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NamespaceConfig {
    pub name: String,
    pub host: String,
}

/// Keys used by the combined dashboard statistics
const RESERVED_NAMESPACE_NAMES: &[&str] = &["total", "by_namespace"];

/// Read-only dashboard settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind_address: String,
    pub namespaces: Vec<NamespaceConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            namespaces: vec![
                NamespaceConfig {
                    name: "master".to_string(),
                    host: "localhost".to_string(),
                },
                NamespaceConfig {
                    name: "slave".to_string(),
                    host: "localhost".to_string(),
                },
            ],
        }
    }
}

impl DashboardConfig {
    fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for namespace in &self.namespaces {
            if namespace.name.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "name",
                    "dashboard.namespaces",
                ));
            }
            if namespace.host.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "host",
                    format!("dashboard namespace '{}'", namespace.name),
                ));
            }
            if RESERVED_NAMESPACE_NAMES.contains(&namespace.name.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "dashboard.namespaces",
                    namespace.name.clone(),
                    "name collides with a combined statistics field",
                ));
            }
            if !seen.insert(namespace.name.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "dashboard.namespaces",
                    namespace.name.clone(),
                    "namespace names must be unique",
                ));
            }
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when neither `RUST_LOG` nor `TASKER_ENV` decide
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
