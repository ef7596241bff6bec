//! Error types for the task executor.
//!
//! Store failures are classified once, at the adapter boundary, into
//! [`StoreError::Unavailable`] (transient, handled by reconnecting) or
//! [`StoreError::InvalidData`] (fatal). Callers of the executor loop only ever
//! look at [`ExecutorError::disposition`].

use thiserror::Error;

use crate::config::ConfigurationError;

/// Failure reported by a task store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection lost, timed out or refused, or the server is not ready yet.
    #[error("Task store unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },
    /// The store returned something the executor cannot interpret, or
    /// rejected a statement in a way retrying cannot fix.
    #[error("Task store returned invalid data during {operation}: {reason}")]
    InvalidData {
        operation: &'static str,
        reason: String,
    },
}

impl StoreError {
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }

    pub fn invalid_data(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether reconnecting and retrying can make this error go away.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Unavailable { operation, .. } | Self::InvalidData { operation, .. } => operation,
        }
    }
}

/// A task handler could not run a task. The task stays pending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task_id} execution failed: {reason}")]
pub struct TaskExecutionError {
    pub task_id: i64,
    pub reason: String,
}

impl TaskExecutionError {
    pub fn new(task_id: i64, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            reason: reason.into(),
        }
    }
}

/// Top-level executor error.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// What the executor loop does with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Drop the store handle, wait, reconnect and keep polling.
    Reconnect,
    /// Stop the process with a failure status.
    Fatal,
}

impl ExecutorError {
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::Store(err) if err.is_transient() => ErrorDisposition::Reconnect,
            _ => ErrorDisposition::Fatal,
        }
    }
}

impl From<ConfigurationError> for ExecutorError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
