//! In-memory task store.
//!
//! Every clone shares one table, so a test can hold a handle while the
//! executor owns another and observe the rows it writes.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{StoreConnector, StoreResult, TaskReader, TaskStore};
use crate::constants::TaskStatus;
use crate::models::{CompletionOutcome, NewTask, Task, TaskCounts};

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<i64, Task>,
    next_id: i64,
}

/// Shared in-process `tasks` table
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    table: Arc<Mutex<MemoryTable>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending task stamped with the current time
    pub fn insert(&self, new_task: NewTask) -> Task {
        self.insert_at(new_task, Utc::now().naive_utc())
    }

    /// Insert a pending task with an explicit `created_at`
    pub fn insert_at(&self, new_task: NewTask, created_at: NaiveDateTime) -> Task {
        let mut table = self.table.lock();
        table.next_id += 1;
        let task = Task {
            id: table.next_id,
            name: new_task.name,
            status: TaskStatus::Pending,
            created_by: new_task.created_by,
            created_at,
            completed_at: None,
        };
        table.rows.insert(task.id, task.clone());
        task
    }

    pub fn get(&self, task_id: i64) -> Option<Task> {
        self.table.lock().rows.get(&task_id).cloned()
    }

    /// All rows ordered by id
    pub fn snapshot(&self) -> Vec<Task> {
        self.table.lock().rows.values().cloned().collect()
    }

    fn pending(&self) -> Vec<Task> {
        let mut pending: Vec<Task> = self
            .table
            .lock()
            .rows
            .values()
            .filter(|task| task.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending
    }

    /// Complete a task directly, outside any executor handle
    pub fn mark_completed(&self, task_id: i64) -> CompletionOutcome {
        let mut table = self.table.lock();
        match table.rows.get_mut(&task_id) {
            None => CompletionOutcome::NotFound,
            Some(task) if task.status.is_terminal() => CompletionOutcome::AlreadyCompleted,
            Some(task) => {
                let completed_at = Utc::now().naive_utc();
                task.status = TaskStatus::Completed;
                task.completed_at = Some(completed_at);
                CompletionOutcome::Completed { completed_at }
            }
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn fetch_pending(&mut self) -> StoreResult<Vec<Task>> {
        Ok(self.pending())
    }

    async fn complete(&mut self, task_id: i64) -> StoreResult<CompletionOutcome> {
        Ok(self.mark_completed(task_id))
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl StoreConnector for InMemoryTaskStore {
    type Store = InMemoryTaskStore;

    async fn connect(&self) -> StoreResult<InMemoryTaskStore> {
        Ok(self.clone())
    }
}

#[async_trait]
impl TaskReader for InMemoryTaskStore {
    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let mut tasks = self.snapshot();
        tasks.reverse();
        Ok(tasks)
    }

    async fn stats(&self) -> StoreResult<TaskCounts> {
        let table = self.table.lock();
        let mut counts = TaskCounts::default();
        for task in table.rows.values() {
            counts.total += 1;
            *counts
                .by_status
                .entry(task.status.as_str().to_string())
                .or_default() += 1;
            *counts.by_creator.entry(task.created_by.clone()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
