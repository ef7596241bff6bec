//! Runtime statistics for the polling executor.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the executor loop and readable from any thread
#[derive(Debug, Default)]
pub struct ExecutorStats {
    /// Poll cycles that fetched a batch (empty or not)
    pub poll_cycles: AtomicU64,
    /// Pending tasks returned across all fetches
    pub tasks_found: AtomicU64,
    /// Tasks this executor moved to completed
    pub tasks_completed: AtomicU64,
    /// Handler failures; those tasks stay pending
    pub tasks_failed: AtomicU64,
    /// Completions that found the task already completed
    pub already_completed: AtomicU64,
    /// Completions for ids that no longer exist
    pub tasks_missing: AtomicU64,
    /// Successful connects after the first one
    pub reconnects: AtomicU64,
    /// Transient store failures seen by the loop
    pub store_errors: AtomicU64,
    /// Failed connection attempts
    pub connect_failures: AtomicU64,
    /// Completion time of the last poll cycle
    pub last_poll_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`ExecutorStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStatsSnapshot {
    pub poll_cycles: u64,
    pub tasks_found: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub already_completed: u64,
    pub tasks_missing: u64,
    pub reconnects: u64,
    pub store_errors: u64,
    pub connect_failures: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
}

impl ExecutorStats {
    pub(crate) fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll(&self, found: usize) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
        self.tasks_found.fetch_add(found as u64, Ordering::Relaxed);
        *self.last_poll_at.lock() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> ExecutorStatsSnapshot {
        ExecutorStatsSnapshot {
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            tasks_found: self.tasks_found.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            already_completed: self.already_completed.load(Ordering::Relaxed),
            tasks_missing: self.tasks_missing.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            last_poll_at: *self.last_poll_at.lock(),
        }
    }
}
