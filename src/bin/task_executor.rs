//! # Task Executor
//!
//! Polls the `tasks` table and completes pending tasks until Ctrl+C or
//! SIGTERM. Exits 0 after a clean shutdown and 1 on a fatal error, including
//! invalid configuration.
//!
//! ```bash
//! POSTGRES_HOST=postgres-master cargo run --bin task-executor
//! ```

use tracing::{error, info};

use tasker_executor::config::ConfigManager;
use tasker_executor::constants::exit_codes;
use tasker_executor::executor::{LoggingTaskHandler, PollingExecutor};
use tasker_executor::logging;
use tasker_executor::shutdown::cancel_on_shutdown_signal;
use tasker_executor::store::PgConnector;

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let manager = match ConfigManager::load() {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return exit_codes::FATAL_ERROR;
        }
    };
    let config = manager.config();
    logging::init_structured_logging(&config.logging, manager.environment());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %manager.environment(),
        config = %manager.debug_config(),
        "Starting task executor"
    );
    info!(url = %config.database.display_url(), "Task store");

    let connector = PgConnector::new(config.database.clone(), config.executor.ensure_schema);
    let executor = PollingExecutor::new(config.executor.clone(), connector, LoggingTaskHandler);
    let cancel = cancel_on_shutdown_signal();

    match executor.run(cancel).await {
        Ok(outcome) => {
            info!(?outcome, stats = ?executor.stats_snapshot(), "Task executor shut down");
            exit_codes::CLEAN_SHUTDOWN
        }
        Err(e) => {
            error!(error = %e, "Task executor stopped on a fatal error");
            exit_codes::FATAL_ERROR
        }
    }
}
