//! # Task Model
//!
//! One row of the shared `tasks` table, plus the SQL the executor, producers and
//! dashboard run against it.
//!
//! ## Database Mapping
//!
//! ```sql
//! CREATE TABLE tasks (
//!   id SERIAL PRIMARY KEY,
//!   task_name VARCHAR(255) NOT NULL,
//!   status VARCHAR(50) DEFAULT 'pending',
//!   created_by VARCHAR(50) NOT NULL,
//!   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
//!   completed_at TIMESTAMP
//! );
//! ```
//!
//! `status` moves from `pending` to `completed` exactly once, and
//! `completed_at` is set in the same statement. Completion never rewrites an
//! existing `completed_at`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{Connection, FromRow, PgConnection, PgExecutor};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::constants::TaskStatus;
use crate::database::schema::{CREATED_BY_MAX_LEN, TASK_NAME_MAX_LEN};

const TASK_COLUMNS: &str = "id, task_name, status, created_by, created_at, completed_at";

/// A unit of work recorded in the `tasks` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub status: TaskStatus,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

/// Raw row as stored; nullable columns stay optional until validated
#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: i32,
    task_name: String,
    status: Option<String>,
    created_by: String,
    created_at: Option<NaiveDateTime>,
    completed_at: Option<NaiveDateTime>,
}

impl TryFrom<TaskRow> for Task {
    type Error = sqlx::Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .as_deref()
            .ok_or_else(|| decode_error(format!("task {} has no status", row.id)))?
            .parse::<TaskStatus>()
            .map_err(decode_error)?;
        let created_at = row
            .created_at
            .ok_or_else(|| decode_error(format!("task {} has no created_at", row.id)))?;

        Ok(Task {
            id: i64::from(row.id),
            name: row.task_name,
            status,
            created_by: row.created_by,
            created_at,
            completed_at: row.completed_at,
        })
    }
}

fn decode_error(message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(message.into().into())
}

fn into_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>, sqlx::Error> {
    rows.into_iter().map(Task::try_from).collect()
}

/// Read-only view: rows that do not decode are logged and left out
fn into_listed_tasks(rows: Vec<TaskRow>) -> Vec<Task> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match Task::try_from(row) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(task_id = id, error = %e, "Skipping undecodable task row");
                    None
                }
            }
        })
        .collect()
}

/// New task for insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is {actual} characters, maximum is {max}")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

impl NewTask {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_by: created_by.into(),
        }
    }

    /// Check the payload against the column constraints
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        check_field("task_name", &self.name, TASK_NAME_MAX_LEN)?;
        check_field("created_by", &self.created_by, CREATED_BY_MAX_LEN)
    }
}

fn check_field(field: &'static str, value: &str, max: usize) -> Result<(), TaskValidationError> {
    if value.trim().is_empty() {
        return Err(TaskValidationError::Empty { field });
    }
    let actual = value.chars().count();
    if actual > max {
        return Err(TaskValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

/// Result of asking the store to complete a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// This call moved the task from pending to completed
    Completed { completed_at: NaiveDateTime },
    /// The task was already completed; nothing was written
    AlreadyCompleted,
    /// No row with that id exists
    NotFound,
}

/// Aggregate counts over one `tasks` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_creator: BTreeMap<String, i64>,
}

impl Task {
    /// `completed_at` is present exactly when the task is completed
    pub fn is_consistent(&self) -> bool {
        (self.status == TaskStatus::Completed) == self.completed_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Insert a new pending task
    pub async fn create<'e, E>(executor: E, new_task: &NewTask) -> Result<Task, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks (task_name, created_by) VALUES ($1, $2) RETURNING {TASK_COLUMNS}"
        ))
        .bind(&new_task.name)
        .bind(&new_task.created_by)
        .fetch_one(executor)
        .await?;

        Task::try_from(row)
    }

    /// All pending tasks, oldest first
    pub async fn list_pending<'e, E>(executor: E) -> Result<Vec<Task>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(executor)
        .await?;

        into_tasks(rows)
    }

    /// Complete a pending task.
    ///
    /// The conditional update and the follow-up lookup run in one transaction,
    /// so a second call for the same id reports `AlreadyCompleted` and leaves
    /// the first `completed_at` untouched.
    pub async fn mark_completed(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<CompletionOutcome, sqlx::Error> {
        let mut tx = conn.begin().await?;

        let completed_at: Option<NaiveDateTime> = sqlx::query_scalar(
            "UPDATE tasks SET status = 'completed', completed_at = CURRENT_TIMESTAMP \
             WHERE id = $1 AND status = 'pending' \
             RETURNING completed_at",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match completed_at {
            Some(completed_at) => CompletionOutcome::Completed { completed_at },
            None => {
                let status: Option<Option<String>> =
                    sqlx::query_scalar("SELECT status FROM tasks WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                match status {
                    None => CompletionOutcome::NotFound,
                    Some(Some(status)) if status == TaskStatus::Completed.as_str() => {
                        CompletionOutcome::AlreadyCompleted
                    }
                    Some(other) => {
                        return Err(decode_error(format!(
                            "task {id} could not be completed from status {other:?}"
                        )))
                    }
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Every task, newest id first. Rows with a missing or unknown status are
    /// skipped; [`Task::count_by_status`] still counts them as `unknown`.
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Task>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY id DESC"
        ))
        .fetch_all(executor)
        .await?;

        Ok(into_listed_tasks(rows))
    }

    pub async fn count_all<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(executor)
            .await
    }

    /// Counts per status; a missing status is reported as `unknown`
    pub async fn count_by_status<'e, E>(executor: E) -> Result<BTreeMap<String, i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(status, 'unknown') AS status, COUNT(*) AS count \
             FROM tasks GROUP BY 1 ORDER BY 1",
        )
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().collect())
    }

    pub async fn count_by_creator<'e, E>(executor: E) -> Result<BTreeMap<String, i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT created_by, COUNT(*) AS count FROM tasks GROUP BY created_by ORDER BY created_by",
        )
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn row(status: Option<&str>) -> TaskRow {
        TaskRow {
            id: 7,
            task_name: "Task-A-1".to_string(),
            status: status.map(str::to_string),
            created_by: "job-a".to_string(),
            created_at: Some(ts(10, 0, 0)),
            completed_at: None,
        }
    }

    #[test]
    fn test_row_conversion() {
        let task = Task::try_from(row(Some("pending"))).unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.name, "Task-A-1");
        assert!(task.is_pending());
        assert!(task.is_consistent());
    }

    #[test]
    fn test_unknown_status_is_a_decode_error() {
        let err = Task::try_from(row(Some("archived"))).unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
        assert!(matches!(
            Task::try_from(row(None)).unwrap_err(),
            sqlx::Error::Decode(_)
        ));
    }

    #[test]
    fn test_listing_skips_only_undecodable_rows() {
        let mut second = row(Some("completed"));
        second.id = 8;
        second.completed_at = Some(ts(10, 1, 0));
        let mut broken = row(None);
        broken.id = 9;
        let mut archived = row(Some("archived"));
        archived.id = 10;

        let tasks = into_listed_tasks(vec![row(Some("pending")), broken, second, archived]);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![7, 8]);

        // The executor path stays strict
        assert!(into_tasks(vec![row(Some("pending")), row(None)]).is_err());
    }

    #[test]
    fn test_consistency_pairing() {
        let mut task = Task::try_from(row(Some("pending"))).unwrap();
        task.completed_at = Some(ts(10, 5, 0));
        assert!(!task.is_consistent());
        task.status = TaskStatus::Completed;
        assert!(task.is_consistent());
        task.completed_at = None;
        assert!(!task.is_consistent());
    }

    #[test]
    fn test_new_task_validation() {
        assert!(NewTask::new("Task-A-1", "job-a").validate().is_ok());
        assert_eq!(
            NewTask::new("  ", "job-a").validate(),
            Err(TaskValidationError::Empty { field: "task_name" })
        );
        assert_eq!(
            NewTask::new("Task", "").validate(),
            Err(TaskValidationError::Empty { field: "created_by" })
        );
        let long_creator = "x".repeat(CREATED_BY_MAX_LEN + 1);
        assert!(matches!(
            NewTask::new("Task", long_creator).validate(),
            Err(TaskValidationError::TooLong { max: 50, actual: 51, .. })
        ));
        assert!(NewTask::new("y".repeat(TASK_NAME_MAX_LEN), "job-b")
            .validate()
            .is_ok());
    }
}
