//! # Executor
//!
//! The polling executor, the handler seam it runs tasks through, and its
//! runtime counters.

pub mod handler;
pub mod poller;
pub mod stats;

pub use handler::{LoggingTaskHandler, TaskHandler};
pub use poller::{CycleReport, ExecutorOutcome, PollingExecutor};
pub use stats::{ExecutorStats, ExecutorStatsSnapshot};
