//! PostgreSQL adapters for the task store ports.

use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::PgConnection;
use std::time::Duration;
use tracing::debug;

use super::{StoreConnector, StoreResult, TaskReader, TaskStore};
use crate::config::DatabaseConfig;
use crate::database::connection::{
    close_connection, connect_options, connect_with_timeout, DatabaseConnection,
};
use crate::database::{classify, ensure_tasks_table};
use crate::error::StoreError;
use crate::models::{CompletionOutcome, Task, TaskCounts};

/// Opens one dedicated connection per [`StoreConnector::connect`] call
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
    connect_timeout: Duration,
    ensure_schema: bool,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig, ensure_schema: bool) -> Self {
        Self::from_options(connect_options(&config), config.connect_timeout(), ensure_schema)
    }

    pub fn from_options(
        options: PgConnectOptions,
        connect_timeout: Duration,
        ensure_schema: bool,
    ) -> Self {
        Self {
            options,
            connect_timeout,
            ensure_schema,
        }
    }
}

#[async_trait]
impl StoreConnector for PgConnector {
    type Store = PgTaskStore;

    async fn connect(&self) -> StoreResult<PgTaskStore> {
        let mut conn = connect_with_timeout(&self.options, self.connect_timeout)
            .await
            .map_err(|e| classify("connect", &e))?;

        if self.ensure_schema {
            if let Err(e) = ensure_tasks_table(&mut conn).await {
                close_connection(conn).await;
                return Err(classify("ensure_schema", &e));
            }
        }

        Ok(PgTaskStore { conn: Some(conn) })
    }
}

/// A task store backed by one exclusively owned connection
#[derive(Debug)]
pub struct PgTaskStore {
    conn: Option<PgConnection>,
}

impl PgTaskStore {
    fn connection(&mut self, operation: &'static str) -> StoreResult<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::unavailable(operation, "connection closed"))
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn fetch_pending(&mut self) -> StoreResult<Vec<Task>> {
        let conn = self.connection("fetch_pending")?;
        Task::list_pending(&mut *conn)
            .await
            .map_err(|e| classify("fetch_pending", &e))
    }

    async fn complete(&mut self, task_id: i64) -> StoreResult<CompletionOutcome> {
        let conn = self.connection("complete")?;
        Task::mark_completed(conn, task_id)
            .await
            .map_err(|e| classify("complete", &e))
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            close_connection(conn).await;
            debug!("Task store connection closed");
        }
    }
}

/// Read-only dashboard access to one namespace over a lazy pool
#[derive(Debug, Clone)]
pub struct PgTaskReader {
    db: DatabaseConnection,
}

impl PgTaskReader {
    /// No connection is attempted until the first request
    pub fn new_lazy(config: &DatabaseConfig) -> Self {
        Self {
            db: DatabaseConnection::new_lazy(config),
        }
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskReader for PgTaskReader {
    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        Task::list_all(self.db.pool())
            .await
            .map_err(|e| classify("list_tasks", &e))
    }

    async fn stats(&self) -> StoreResult<TaskCounts> {
        let pool = self.db.pool();
        let total = Task::count_all(pool)
            .await
            .map_err(|e| classify("stats", &e))?;
        let by_status = Task::count_by_status(pool)
            .await
            .map_err(|e| classify("stats", &e))?;
        let by_creator = Task::count_by_creator(pool)
            .await
            .map_err(|e| classify("stats", &e))?;

        Ok(TaskCounts {
            total,
            by_status,
            by_creator,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        match self.db.health_check().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(StoreError::unavailable("ping", "unexpected health check result")),
            Err(e) => Err(classify("ping", &e)),
        }
    }
}
