//! # Task Store Ports
//!
//! The executor talks to the `tasks` table only through [`StoreConnector`] and
//! [`TaskStore`]; the dashboard only through [`TaskReader`]. Every method
//! returns a [`StoreError`] that the adapter has already classified as
//! transient or fatal.
//!
//! Adapters:
//! - [`postgres`] - `sqlx` over a dedicated connection (executor) or a pool (dashboard)
//! - [`memory`] - shared in-process table used by tests and local runs

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{CompletionOutcome, Task, TaskCounts};

pub use memory::InMemoryTaskStore;
pub use postgres::{PgConnector, PgTaskReader, PgTaskStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// An exclusively owned handle on the task store
#[async_trait]
pub trait TaskStore: Send {
    /// Pending tasks ordered by `created_at ASC, id ASC`
    async fn fetch_pending(&mut self) -> StoreResult<Vec<Task>>;

    /// Mark a task completed. Calling it again for the same id is a no-op.
    async fn complete(&mut self, task_id: i64) -> StoreResult<CompletionOutcome>;

    /// Release the handle. Later calls fail with [`StoreError::Unavailable`].
    async fn close(&mut self);
}

/// Produces fresh store handles; called at startup and after every transient failure
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: TaskStore;

    async fn connect(&self) -> StoreResult<Self::Store>;
}

/// Read-only view used by the dashboard
#[async_trait]
pub trait TaskReader: Send + Sync {
    /// All tasks ordered by `id DESC`
    async fn list_tasks(&self) -> StoreResult<Vec<Task>>;

    async fn stats(&self) -> StoreResult<TaskCounts>;

    async fn ping(&self) -> StoreResult<()>;
}
