//! # Tasks Table Schema
//!
//! The `tasks` table is the contract shared by producers, the executor and the
//! dashboard. Creation is idempotent; there are no further migrations.

use sqlx::PgConnection;

pub const CREATE_TASKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id SERIAL PRIMARY KEY,
    task_name VARCHAR(255) NOT NULL,
    status VARCHAR(50) DEFAULT 'pending',
    created_by VARCHAR(50) NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    completed_at TIMESTAMP
)
"#;

pub const CREATE_PENDING_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS tasks_status_created_at_id_idx
    ON tasks (status, created_at, id)
"#;

/// Maximum `task_name` length accepted by the schema
pub const TASK_NAME_MAX_LEN: usize = 255;

/// Maximum `created_by` length accepted by the schema
pub const CREATED_BY_MAX_LEN: usize = 50;

/// Create the `tasks` table and its polling index if they do not exist
pub async fn ensure_tasks_table(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_TASKS_TABLE).execute(&mut *conn).await?;
    sqlx::query(CREATE_PENDING_INDEX).execute(&mut *conn).await?;
    tracing::debug!("Tasks table created or already exists");
    Ok(())
}
