//! Task handlers: what "executing" a task means.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::error::TaskExecutionError;
use crate::models::Task;

/// Runs a single task. An error leaves the task pending for a later cycle.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, task: &Task) -> Result<(), TaskExecutionError>;
}

/// Default handler: records the task in the log and succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTaskHandler;

#[async_trait]
impl TaskHandler for LoggingTaskHandler {
    async fn execute(&self, task: &Task) -> Result<(), TaskExecutionError> {
        info!(
            task_id = task.id,
            task_name = %task.name,
            created_by = %task.created_by,
            created_at = %task.created_at,
            executed_at = %Utc::now().to_rfc3339(),
            "Executing task"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TaskStatus;

    #[tokio::test]
    async fn test_logging_handler_never_fails() {
        let task = Task {
            id: 1,
            name: "Task-A-1".to_string(),
            status: TaskStatus::Pending,
            created_by: "job-a".to_string(),
            created_at: Utc::now().naive_utc(),
            completed_at: None,
        };
        assert!(LoggingTaskHandler.execute(&task).await.is_ok());
    }
}
