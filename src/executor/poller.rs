//! # Polling Executor
//!
//! Sequential connect, poll, execute, complete loop over a [`StoreConnector`].
//!
//! Each cycle fetches every pending task (oldest first), runs the handler on
//! each one and records the completion before moving to the next, pausing
//! `inter_task_delay` between tasks and `poll_interval` between cycles. A
//! task is only ever marked completed after its handler returned `Ok`, so a
//! crash between the two leaves it pending and it runs again on the next
//! cycle (at-least-once).
//!
//! A transient store error drops the current handle, waits
//! `reconnect_delay` and connects again, without limit. Anything else is
//! fatal and ends [`PollingExecutor::run`] with an error. Every store call is
//! bounded by `operation_timeout`; running out of time counts as a lost
//! connection. Cancellation interrupts waits and in-flight store calls.
//!
//! Only one executor may poll a given table: pending rows are read without
//! row locks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handler::TaskHandler;
use super::stats::{ExecutorStats, ExecutorStatsSnapshot};
use crate::config::PollingConfig;
use crate::constants::{ExecutorState, TaskStatus};
use crate::error::{ErrorDisposition, ExecutorError, StoreError};
use crate::logging::{log_error, log_state_transition, log_task_operation};
use crate::models::{CompletionOutcome, Task};
use crate::store::{StoreConnector, StoreResult, TaskStore};

/// How a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorOutcome {
    /// The cancellation token fired
    Cancelled,
}

/// What one poll cycle did, by task id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub completed: Vec<i64>,
    pub failed: Vec<i64>,
    pub already_completed: Vec<i64>,
    pub missing: Vec<i64>,
    /// Cancellation stopped the batch before every task was processed
    pub interrupted: bool,
}

pub struct PollingExecutor<C, H> {
    executor_id: Uuid,
    config: PollingConfig,
    connector: C,
    handler: H,
    stats: Arc<ExecutorStats>,
    state_tx: watch::Sender<ExecutorState>,
}

impl<C, H> std::fmt::Debug for PollingExecutor<C, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingExecutor")
            .field("executor_id", &self.executor_id)
            .field("config", &self.config)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl<C, H> PollingExecutor<C, H>
where
    C: StoreConnector,
    H: TaskHandler,
{
    pub fn new(config: PollingConfig, connector: C, handler: H) -> Self {
        let executor_id = Uuid::new_v4();
        let (state_tx, _) = watch::channel(ExecutorState::Connecting);

        info!(
            executor_id = %executor_id,
            poll_interval = ?config.poll_interval(),
            inter_task_delay = ?config.inter_task_delay(),
            reconnect_delay = ?config.reconnect_delay(),
            operation_timeout = ?config.operation_timeout(),
            "Creating PollingExecutor"
        );

        Self {
            executor_id,
            config,
            connector,
            handler,
            stats: Arc::new(ExecutorStats::default()),
            state_tx,
        }
    }

    pub fn executor_id(&self) -> Uuid {
        self.executor_id
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Shared counters, updated while the executor runs
    pub fn stats(&self) -> Arc<ExecutorStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats_snapshot(&self) -> ExecutorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Subscribe to state changes
    pub fn state(&self) -> watch::Receiver<ExecutorState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> ExecutorState {
        *self.state_tx.borrow()
    }

    /// Run until `cancel` fires or a fatal error occurs
    pub async fn run(&self, cancel: CancellationToken) -> Result<ExecutorOutcome, ExecutorError> {
        info!(executor_id = %self.executor_id, "Task executor starting");

        let startup_delay = self.config.startup_delay();
        if !startup_delay.is_zero() {
            debug!(delay = ?startup_delay, "Waiting before first connection attempt");
            if !self.pause(startup_delay, &cancel).await {
                return Ok(self.shut_down(None).await);
            }
        }

        let mut connected_before = false;
        loop {
            self.transition(ExecutorState::Connecting);
            let mut store = match self.connect(&cancel).await {
                Ok(Some(store)) => store,
                Ok(None) => return Ok(self.shut_down(None).await),
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            };
            if connected_before {
                ExecutorStats::increment(&self.stats.reconnects);
                info!(executor_id = %self.executor_id, "Reconnected to task store");
            }
            connected_before = true;
            self.transition(ExecutorState::Polling);

            let error = match self.poll(&mut store, &cancel).await {
                Ok(()) => return Ok(self.shut_down(Some(&mut store)).await),
                Err(e) => e,
            };
            self.close_store(&mut store).await;

            match error.disposition() {
                ErrorDisposition::Reconnect => {
                    ExecutorStats::increment(&self.stats.store_errors);
                    warn!(
                        executor_id = %self.executor_id,
                        error = %error,
                        retry_in = ?self.config.reconnect_delay(),
                        "Task store failure, reconnecting"
                    );
                    self.transition(ExecutorState::Connecting);
                    if !self.pause(self.config.reconnect_delay(), &cancel).await {
                        return Ok(self.shut_down(None).await);
                    }
                }
                ErrorDisposition::Fatal => {
                    self.fail(&error);
                    return Err(error);
                }
            }
        }
    }

    /// Fetch the pending batch once and process it
    pub async fn run_cycle(
        &self,
        store: &mut C::Store,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, ExecutorError> {
        self.transition(ExecutorState::Polling);
        let Some(tasks) = self
            .store_call("fetch_pending", cancel, store.fetch_pending())
            .await?
        else {
            return Ok(CycleReport {
                interrupted: true,
                ..CycleReport::default()
            });
        };
        self.stats.record_poll(tasks.len());

        let mut report = CycleReport {
            fetched: tasks.len(),
            ..CycleReport::default()
        };
        if tasks.is_empty() {
            return Ok(report);
        }

        info!(count = tasks.len(), "Found pending tasks");
        self.transition(ExecutorState::Executing);
        self.process_batch(store, &tasks, cancel, &mut report).await?;
        self.transition(ExecutorState::Polling);

        Ok(report)
    }

    async fn process_batch(
        &self,
        store: &mut C::Store,
        tasks: &[Task],
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<(), ExecutorError> {
        for (index, task) in tasks.iter().enumerate() {
            let proceed = if index == 0 {
                !cancel.is_cancelled()
            } else {
                self.pause(self.config.inter_task_delay(), cancel).await
            };
            if !proceed {
                report.interrupted = true;
                break;
            }

            if let Err(e) = self.handler.execute(task).await {
                ExecutorStats::increment(&self.stats.tasks_failed);
                warn!(
                    task_id = task.id,
                    task_name = %task.name,
                    error = %e,
                    "Task execution failed, leaving it pending"
                );
                report.failed.push(task.id);
                continue;
            }

            let Some(outcome) = self
                .store_call("complete", cancel, store.complete(task.id))
                .await?
            else {
                report.interrupted = true;
                break;
            };

            match outcome {
                CompletionOutcome::Completed { completed_at } => {
                    ExecutorStats::increment(&self.stats.tasks_completed);
                    let details = format!("completed_at={completed_at}");
                    log_task_operation(
                        "complete",
                        task.id,
                        &task.name,
                        TaskStatus::Completed.as_str(),
                        Some(details.as_str()),
                    );
                    report.completed.push(task.id);
                }
                CompletionOutcome::AlreadyCompleted => {
                    ExecutorStats::increment(&self.stats.already_completed);
                    debug!(task_id = task.id, "Task was already completed");
                    report.already_completed.push(task.id);
                }
                CompletionOutcome::NotFound => {
                    ExecutorStats::increment(&self.stats.tasks_missing);
                    warn!(task_id = task.id, "Task disappeared before completion");
                    report.missing.push(task.id);
                }
            }
        }
        Ok(())
    }

    /// Poll cycles on one store handle until cancellation or an error
    async fn poll(
        &self,
        store: &mut C::Store,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let report = self.run_cycle(store, cancel).await?;
            if report.fetched == 0 {
                info!("No pending tasks");
            } else {
                debug!(
                    completed = report.completed.len(),
                    failed = report.failed.len(),
                    already_completed = report.already_completed.len(),
                    missing = report.missing.len(),
                    "Poll cycle finished"
                );
            }

            if !self.pause(self.config.poll_interval(), cancel).await {
                return Ok(());
            }
        }
    }

    /// Connect with constant backoff. `None` means cancelled.
    async fn connect(&self, cancel: &CancellationToken) -> Result<Option<C::Store>, ExecutorError> {
        let mut attempt: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            attempt += 1;

            match self
                .store_call("connect", cancel, self.connector.connect())
                .await
            {
                Ok(Some(store)) => {
                    info!(attempt, "Connected to task store");
                    return Ok(Some(store));
                }
                Ok(None) => return Ok(None),
                Err(e) if e.is_transient() => {
                    ExecutorStats::increment(&self.stats.connect_failures);
                    warn!(
                        attempt,
                        error = %e,
                        retry_in = ?self.config.reconnect_delay(),
                        "Task store connection failed"
                    );
                    if !self.pause(self.config.reconnect_delay(), cancel).await {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run one store call under `operation_timeout`. `Ok(None)` means
    /// cancellation won; a call that is already done still returns its result.
    async fn store_call<T, F>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<Option<T>, StoreError>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let limit = self.config.operation_timeout();
        tokio::select! {
            biased;
            result = tokio::time::timeout(limit, call) => match result {
                Ok(result) => result.map(Some),
                Err(_) => Err(StoreError::unavailable(
                    operation,
                    format!("timed out after {limit:?}"),
                )),
            },
            _ = cancel.cancelled() => Ok(None),
        }
    }

    /// Close a store handle, abandoning it if closing hangs
    async fn close_store(&self, store: &mut C::Store) {
        let limit = self.config.operation_timeout();
        if tokio::time::timeout(limit, store.close()).await.is_err() {
            warn!(timeout = ?limit, "Closing the task store timed out, dropping the handle");
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn shut_down(&self, store: Option<&mut C::Store>) -> ExecutorOutcome {
        self.transition(ExecutorState::ShuttingDown);
        if let Some(store) = store {
            self.close_store(store).await;
        }
        info!(
            executor_id = %self.executor_id,
            stats = ?self.stats.snapshot(),
            "Task executor stopped"
        );
        ExecutorOutcome::Cancelled
    }

    fn fail(&self, error: &ExecutorError) {
        log_error("executor", "run", &error.to_string(), None);
        self.transition(ExecutorState::Failed);
    }

    fn transition(&self, next: ExecutorState) {
        let previous = self.state_tx.send_replace(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(from = %previous, to = %next, "Unexpected executor state transition");
        }
        log_state_transition(previous, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskExecutionError;
    use crate::executor::LoggingTaskHandler;
    use crate::models::NewTask;
    use crate::store::InMemoryTaskStore;
    use async_trait::async_trait;

    fn fast_config() -> PollingConfig {
        PollingConfig {
            poll_interval_ms: 10,
            inter_task_delay_ms: 0,
            reconnect_delay_ms: 10,
            startup_delay_ms: 0,
            operation_timeout_ms: 1_000,
            ensure_schema: false,
        }
    }

    /// Fails every task whose name starts with `fail`
    struct SelectiveHandler;

    #[async_trait]
    impl TaskHandler for SelectiveHandler {
        async fn execute(&self, task: &Task) -> Result<(), TaskExecutionError> {
            if task.name.starts_with("fail") {
                Err(TaskExecutionError::new(task.id, "refused"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_cycle_completes_pending_tasks_in_order() {
        let table = InMemoryTaskStore::new();
        for name in ["Task-A-1", "Task-A-2", "Task-A-3"] {
            table.insert(NewTask::new(name, "job-a"));
        }
        let executor = PollingExecutor::new(fast_config(), table.clone(), LoggingTaskHandler);
        let mut store = table.clone();

        let report = executor
            .run_cycle(&mut store, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.completed, vec![1, 2, 3]);
        assert!(table.snapshot().iter().all(|t| t.is_consistent() && !t.is_pending()));
        assert_eq!(executor.current_state(), ExecutorState::Polling);

        let empty = executor
            .run_cycle(&mut store, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(empty, CycleReport::default());
        assert_eq!(executor.stats_snapshot().poll_cycles, 2);
    }

    #[tokio::test]
    async fn test_failed_task_stays_pending_and_batch_continues() {
        let table = InMemoryTaskStore::new();
        table.insert(NewTask::new("fail-first", "job-a"));
        table.insert(NewTask::new("ok-second", "job-a"));
        let executor = PollingExecutor::new(fast_config(), table.clone(), SelectiveHandler);
        let mut store = table.clone();

        let report = executor
            .run_cycle(&mut store, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, vec![1]);
        assert_eq!(report.completed, vec![2]);
        assert!(table.get(1).unwrap().is_pending());
        assert_eq!(executor.stats_snapshot().tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_interrupts_batch() {
        let table = InMemoryTaskStore::new();
        table.insert(NewTask::new("Task-A-1", "job-a"));
        let executor = PollingExecutor::new(fast_config(), table.clone(), LoggingTaskHandler);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut store = table.clone();
        let report = executor.run_cycle(&mut store, &cancel).await.unwrap();
        assert!(report.interrupted);
        assert!(report.completed.is_empty());
        assert!(table.get(1).unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let table = InMemoryTaskStore::new();
        table.insert(NewTask::new("Task-B-1", "job-b"));
        let executor = Arc::new(PollingExecutor::new(
            fast_config(),
            table.clone(),
            LoggingTaskHandler,
        ));
        let cancel = CancellationToken::new();

        let handle = {
            let executor = Arc::clone(&executor);
            let cancel = cancel.clone();
            tokio::spawn(async move { executor.run(cancel).await })
        };

        let mut state = executor.state();
        while executor.stats_snapshot().poll_cycles < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, ExecutorOutcome::Cancelled);
        assert_eq!(*state.borrow_and_update(), ExecutorState::ShuttingDown);
        assert!(!table.get(1).unwrap().is_pending());
    }
}
