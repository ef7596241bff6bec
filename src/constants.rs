//! # System Constants
//!
//! Task status values shared with producers and the dashboard through the
//! `tasks` table, the executor's process-level state machine, and default
//! timings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted task status. Transitions exactly once, `Pending -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Inserted by a producer, not yet executed
    Pending,
    /// Executed and durably recorded
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// `Pending -> Completed` is the only legal transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!((self, next), (Self::Pending, Self::Completed))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Executor process state.
///
/// `Connecting -> Polling -> (Executing <-> Polling) -> ShuttingDown | Failed`.
/// A store error in `Polling` or `Executing` goes back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Connecting,
    Polling,
    Executing,
    ShuttingDown,
    Failed,
}

impl ExecutorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Failed)
    }

    pub fn can_transition_to(&self, next: ExecutorState) -> bool {
        use ExecutorState::*;
        match (self, next) {
            (ShuttingDown | Failed, _) => false,
            (_, ShuttingDown) => true,
            (Connecting, Polling) => true,
            (Polling, Executing | Connecting | Failed) => true,
            (Executing, Polling | Connecting | Failed) => true,
            (Connecting, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Polling => write!(f, "polling"),
            Self::Executing => write!(f, "executing"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Default timings, in milliseconds.
pub mod timing {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
    pub const DEFAULT_INTER_TASK_DELAY_MS: u64 = 1_000;
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;
}

/// Process exit codes for the executor binary.
pub mod exit_codes {
    pub const CLEAN_SHUTDOWN: i32 = 0;
    pub const FATAL_ERROR: i32 = 1;
}
