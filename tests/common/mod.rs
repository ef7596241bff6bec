//! Fault-injecting store and recording handler shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasker_executor::config::PollingConfig;
use tasker_executor::error::{StoreError, TaskExecutionError};
use tasker_executor::executor::TaskHandler;
use tasker_executor::models::{CompletionOutcome, Task};
use tasker_executor::store::{InMemoryTaskStore, StoreConnector, TaskStore};

/// Faults to inject and calls observed
#[derive(Debug, Default)]
pub struct FaultPlan {
    /// Fail this many upcoming connects with a transient error
    pub fail_connects: u32,
    /// Fail this many upcoming fetches with a transient error
    pub fail_fetches: u32,
    /// Never answer this many upcoming fetches (a half-open connection)
    pub hang_fetches: u32,
    /// Fail the next completion of these ids with a transient error, once each
    pub fail_complete_once: HashSet<i64>,
    /// Return undecodable data from every fetch
    pub corrupt_fetch: bool,
    pub connect_calls: u32,
    pub close_calls: u32,
    /// Ids whose completion reached the table, in call order
    pub completions: Vec<i64>,
}

/// Connector over an in-memory table that injects faults from a shared plan
#[derive(Clone)]
pub struct FlakyConnector {
    table: InMemoryTaskStore,
    plan: Arc<Mutex<FaultPlan>>,
}

impl FlakyConnector {
    pub fn new(table: InMemoryTaskStore) -> Self {
        Self {
            table,
            plan: Arc::new(Mutex::new(FaultPlan::default())),
        }
    }

    pub fn plan(&self) -> Arc<Mutex<FaultPlan>> {
        Arc::clone(&self.plan)
    }

    pub fn with_plan(self, configure: impl FnOnce(&mut FaultPlan)) -> Self {
        configure(&mut *self.plan.lock().unwrap());
        self
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    type Store = FlakyStore;

    async fn connect(&self) -> Result<FlakyStore, StoreError> {
        let mut plan = self.plan.lock().unwrap();
        plan.connect_calls += 1;
        if plan.fail_connects > 0 {
            plan.fail_connects -= 1;
            return Err(StoreError::unavailable("connect", "connection refused"));
        }
        Ok(FlakyStore {
            inner: self.table.clone(),
            plan: Arc::clone(&self.plan),
            closed: false,
        })
    }
}

pub struct FlakyStore {
    inner: InMemoryTaskStore,
    plan: Arc<Mutex<FaultPlan>>,
    closed: bool,
}

impl FlakyStore {
    fn check_open(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::unavailable(operation, "connection closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn fetch_pending(&mut self) -> Result<Vec<Task>, StoreError> {
        self.check_open("fetch_pending")?;
        let hang = {
            let mut plan = self.plan.lock().unwrap();
            if plan.corrupt_fetch {
                return Err(StoreError::invalid_data(
                    "fetch_pending",
                    "Invalid task status: lost",
                ));
            }
            if plan.fail_fetches > 0 {
                plan.fail_fetches -= 1;
                return Err(StoreError::unavailable("fetch_pending", "connection reset"));
            }
            let hang = plan.hang_fetches > 0;
            if hang {
                plan.hang_fetches -= 1;
            }
            hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        self.inner.fetch_pending().await
    }

    async fn complete(&mut self, task_id: i64) -> Result<CompletionOutcome, StoreError> {
        self.check_open("complete")?;
        {
            let mut plan = self.plan.lock().unwrap();
            if plan.fail_complete_once.remove(&task_id) {
                return Err(StoreError::unavailable("complete", "server closed the connection"));
            }
        }
        let outcome = self.inner.complete(task_id).await?;
        self.plan.lock().unwrap().completions.push(task_id);
        Ok(outcome)
    }

    async fn close(&mut self) {
        self.closed = true;
        self.plan.lock().unwrap().close_calls += 1;
    }
}

/// Handler that records every execution and fails the configured names
#[derive(Clone, Default)]
pub struct RecordingHandler {
    executed: Arc<Mutex<Vec<i64>>>,
    failing: Arc<HashSet<String>>,
    before_success: Option<Arc<dyn Fn(&Task) + Send + Sync>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: Arc::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Run a side effect before reporting success (e.g. another actor completing the row)
    pub fn with_side_effect(mut self, effect: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.before_success = Some(Arc::new(effect));
        self
    }

    pub fn executed(&self) -> Vec<i64> {
        self.executed.lock().unwrap().clone()
    }

    pub fn execution_counts(&self) -> HashMap<i64, usize> {
        let mut counts = HashMap::new();
        for id in self.executed() {
            *counts.entry(id).or_default() += 1;
        }
        counts
    }
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn execute(&self, task: &Task) -> Result<(), TaskExecutionError> {
        self.executed.lock().unwrap().push(task.id);
        if self.failing.contains(&task.name) {
            return Err(TaskExecutionError::new(task.id, "handler refused"));
        }
        if let Some(effect) = &self.before_success {
            effect(task);
        }
        Ok(())
    }
}

pub fn fast_polling() -> PollingConfig {
    PollingConfig {
        poll_interval_ms: 10,
        inter_task_delay_ms: 1,
        reconnect_delay_ms: 10,
        startup_delay_ms: 0,
        operation_timeout_ms: 200,
        ensure_schema: false,
    }
}

/// Poll `condition` every few milliseconds, panicking after `timeout`
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
