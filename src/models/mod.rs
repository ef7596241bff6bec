//! # Data Models
//!
//! Row types for the shared `tasks` table.

pub mod task;

pub use task::{CompletionOutcome, NewTask, Task, TaskCounts, TaskValidationError};
