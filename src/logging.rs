//! # Structured Logging Module
//!
//! Console logging for the executor, producer and dashboard processes.
//! Operators observe executor liveness entirely through this stream: every
//! state transition, poll result, task execution and reconnect attempt is a
//! structured record.
//!
//! Filter precedence: `RUST_LOG`, then the deployment environment resolved by
//! [`ConfigManager::environment`](crate::config::ConfigManager::environment),
//! then the configured level.

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::constants::ExecutorState;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging(config: &LoggingConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = build_filter(config, environment);

        let layer = match config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed(),
        };

        // A subscriber may already be installed (tests, embedding processes)
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::debug!(
            environment = %environment,
            format = ?config.format,
            "Structured logging initialized"
        );
    });
}

fn build_filter(config: &LoggingConfig, environment: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = get_log_level(environment).unwrap_or(config.level.as_str());
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log level implied by the deployment environment, if it implies one.
/// `development` (the default) defers to the configured level.
fn get_log_level(environment: &str) -> Option<&'static str> {
    match environment {
        "test" => Some("debug"),
        "production" => Some("info"),
        _ => None,
    }
}

/// Log structured data for task operations
pub fn log_task_operation(
    operation: &str,
    task_id: i64,
    task_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = task_id,
        task_name = %task_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "TASK_OPERATION"
    );
}

/// Log an executor state machine transition
pub fn log_state_transition(from: ExecutorState, to: ExecutorState) {
    tracing::info!(
        from = %from,
        to = %to,
        timestamp = %Utc::now().to_rfc3339(),
        "STATE_TRANSITION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
