//! # Task Producer
//!
//! Inserts batches of pending tasks into the shared table. Producers run to
//! completion and exit; the executor picks the rows up on its next cycle.

use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::database::{classify, ensure_tasks_table, DatabaseConnection};
use crate::error::StoreError;
use crate::models::{NewTask, Task, TaskValidationError};

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Invalid task: {0}")]
    Validation(#[from] TaskValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No tasks to insert")]
    EmptyBatch,
}

pub type ProducerResult<T> = Result<T, ProducerError>;

/// Default batch for a producer: `job-a` produces `Task-A-1..3`, any other
/// identity `{created_by}-1..3`.
pub fn default_task_names(created_by: &str, count: usize) -> Vec<String> {
    let prefix = match created_by.strip_prefix("job-") {
        Some(suffix) if !suffix.is_empty() => format!("Task-{}", suffix.to_uppercase()),
        _ => created_by.to_string(),
    };
    (1..=count).map(|n| format!("{prefix}-{n}")).collect()
}

#[derive(Debug, Clone)]
pub struct TaskProducer {
    pool: PgPool,
}

impl TaskProducer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a constant delay between attempts
    pub async fn connect_with_retry(
        config: &DatabaseConfig,
        max_attempts: u32,
        delay: Duration,
    ) -> ProducerResult<Self> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match DatabaseConnection::new(config).await {
                Ok(db) => {
                    info!(url = %config.display_url(), attempt, "Connected to database");
                    return Ok(Self::new(db.pool().clone()));
                }
                Err(e) => {
                    let err = classify("connect", &e);
                    if attempt >= max_attempts || !err.is_transient() {
                        return Err(err.into());
                    }
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        retry_in = ?delay,
                        "Database not reachable yet"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `tasks` table if it does not exist
    pub async fn ensure_schema(&self) -> ProducerResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| classify("ensure_schema", &e))?;
        ensure_tasks_table(&mut conn)
            .await
            .map_err(|e| classify("ensure_schema", &e))?;
        info!("Tasks table created or already exists");
        Ok(())
    }

    /// Insert every task in one transaction; either all rows land or none do
    pub async fn insert_batch(&self, tasks: &[NewTask]) -> ProducerResult<Vec<Task>> {
        if tasks.is_empty() {
            return Err(ProducerError::EmptyBatch);
        }
        for task in tasks {
            task.validate()?;
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify("insert_batch", &e))?;

        let mut created = Vec::with_capacity(tasks.len());
        for new_task in tasks {
            let task = Task::create(&mut *tx, new_task)
                .await
                .map_err(|e| classify("insert_batch", &e))?;
            created.push(task);
        }

        tx.commit()
            .await
            .map_err(|e| classify("insert_batch", &e))?;

        for task in &created {
            info!(task_id = task.id, task_name = %task.name, created_by = %task.created_by, "Inserted task");
        }
        Ok(created)
    }
}
