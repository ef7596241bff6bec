//! # Database Layer
//!
//! PostgreSQL access for the shared `tasks` table.
//!
//! - [`connection`] - dedicated connections and pools built from [`DatabaseConfig`](crate::config::DatabaseConfig)
//! - [`schema`] - idempotent table creation
//! - [`error_codes`] - SQLSTATE constants and `sqlx` error classification

pub mod connection;
pub mod error_codes;
pub mod schema;

pub use connection::{connect, connect_options, connect_with_timeout, DatabaseConnection};
pub use error_codes::{classify, PgErrorCode};
pub use schema::ensure_tasks_table;
