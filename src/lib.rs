#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Executor
//!
//! A minimal distributed task queue built around one shared PostgreSQL table.
//!
//! ## Overview
//!
//! Producers insert `pending` rows into `tasks`. A single polling executor
//! fetches them oldest first, runs each one through a [`TaskHandler`] and
//! marks it `completed`. A read-only dashboard aggregates task state across
//! independently configured stores ("namespaces").
//!
//! Execution is at-least-once: a task is marked completed only after its
//! handler succeeded, and completion itself is idempotent.
//!
//! ## Module Organization
//!
//! - [`executor`] - the polling loop, handlers and runtime counters
//! - [`store`] - store ports and their PostgreSQL and in-memory adapters
//! - [`models`] - the `tasks` row model and its SQL
//! - [`producer`] - batch insertion of new tasks
//! - [`dashboard`] - read-only aggregation and its HTTP API
//! - [`database`] - connections, schema bootstrap, SQLSTATE classification
//! - [`config`] - layered configuration
//! - [`error`] - error taxonomy
//! - [`logging`] - structured logging setup
//! - [`shutdown`] - Ctrl+C / SIGTERM handling for the binaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_executor::config::ConfigManager;
//! use tasker_executor::executor::{LoggingTaskHandler, PollingExecutor};
//! use tasker_executor::store::PgConnector;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//!
//! let connector = PgConnector::new(config.database.clone(), config.executor.ensure_schema);
//! let executor = PollingExecutor::new(config.executor.clone(), connector, LoggingTaskHandler);
//!
//! let cancel = CancellationToken::new();
//! executor.run(cancel).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live next to the code. Integration tests under `tests/` run the
//! executor against the in-memory store with injected faults; the PostgreSQL
//! tests run only when `DATABASE_URL` is set.

pub mod config;
pub mod constants;
pub mod dashboard;
pub mod database;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod producer;
pub mod shutdown;
pub mod store;

pub use config::{ConfigManager, TaskerExecutorConfig};
pub use constants::{ExecutorState, TaskStatus};
pub use error::{ErrorDisposition, ExecutorError, Result, StoreError, TaskExecutionError};
pub use executor::{
    CycleReport, ExecutorOutcome, ExecutorStats, LoggingTaskHandler, PollingExecutor, TaskHandler,
};
pub use models::{CompletionOutcome, NewTask, Task, TaskCounts};
pub use store::{InMemoryTaskStore, StoreConnector, TaskReader, TaskStore};
