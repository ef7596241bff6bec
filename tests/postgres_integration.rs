//! PostgreSQL round trip: producer, store adapter, reader and executor.
//!
//! Runs only when `DATABASE_URL` points at a disposable database; the
//! executor completes every pending row it finds there.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tasker_executor::config::PollingConfig;
use tasker_executor::database::DatabaseConnection;
use tasker_executor::executor::{LoggingTaskHandler, PollingExecutor};
use tasker_executor::models::{CompletionOutcome, NewTask, Task};
use tasker_executor::producer::TaskProducer;
use tasker_executor::store::{PgConnector, PgTaskReader, StoreConnector, TaskReader, TaskStore};
use tasker_executor::TaskStatus;

fn database_url() -> Option<String> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL integration test");
            None
        }
    }
}

async fn own_tasks(pool: &sqlx::PgPool, created_by: &str) -> Vec<Task> {
    Task::list_all(pool)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.created_by == created_by)
        .collect()
}

#[tokio::test]
async fn test_postgres_round_trip() {
    let Some(url) = database_url() else {
        return;
    };
    let options = PgConnectOptions::from_str(&url).unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(options.clone())
        .await
        .unwrap();
    let created_by = format!("it-{}", &Uuid::new_v4().simple().to_string()[..8]);

    // Producer
    let producer = TaskProducer::new(pool.clone());
    producer.ensure_schema().await.unwrap();
    let created = producer
        .insert_batch(&[
            NewTask::new("Task-IT-1", created_by.clone()),
            NewTask::new("Task-IT-2", created_by.clone()),
            NewTask::new("Task-IT-3", created_by.clone()),
        ])
        .await
        .unwrap();
    assert_eq!(created.len(), 3);
    assert!(created.iter().all(|t| t.status == TaskStatus::Pending && t.is_consistent()));

    // Store adapter
    let connector = PgConnector::from_options(options.clone(), Duration::from_secs(5), true);
    let mut store = connector.connect().await.unwrap();
    let pending: Vec<i64> = store
        .fetch_pending()
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.created_by == created_by)
        .map(|t| t.id)
        .collect();
    assert_eq!(pending, created.iter().map(|t| t.id).collect::<Vec<_>>());

    let first = created[0].id;
    let CompletionOutcome::Completed { completed_at } = store.complete(first).await.unwrap() else {
        panic!("first completion should complete the task");
    };
    assert_eq!(
        store.complete(first).await.unwrap(),
        CompletionOutcome::AlreadyCompleted
    );
    assert_eq!(
        store.complete(i64::from(i32::MAX)).await.unwrap(),
        CompletionOutcome::NotFound
    );
    let stored = own_tasks(&pool, &created_by).await;
    let stored_first = stored.iter().find(|t| t.id == first).unwrap();
    assert_eq!(stored_first.completed_at, Some(completed_at));
    store.close().await;
    assert!(store.fetch_pending().await.unwrap_err().is_transient());

    // Reader
    let reader = PgTaskReader::from_connection(DatabaseConnection::from_pool(pool.clone()));
    reader.ping().await.unwrap();
    let counts = reader.stats().await.unwrap();
    assert_eq!(counts.by_creator.get(&created_by), Some(&3));

    // Executor
    let config = PollingConfig {
        poll_interval_ms: 50,
        inter_task_delay_ms: 0,
        reconnect_delay_ms: 50,
        startup_delay_ms: 0,
        operation_timeout_ms: 1_000,
        ensure_schema: false,
    };
    let executor = Arc::new(PollingExecutor::new(config, connector, LoggingTaskHandler));
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let executor = Arc::clone(&executor);
        let cancel = cancel.clone();
        async move { executor.run(cancel).await }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let tasks = own_tasks(&pool, &created_by).await;
        if tasks.iter().all(|t| t.status == TaskStatus::Completed) {
            assert!(tasks.iter().all(Task::is_consistent));
            let first = tasks.iter().find(|t| t.id == created[0].id).unwrap();
            assert_eq!(first.completed_at, Some(completed_at));
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "executor did not drain the batch");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cancel.cancel();
    run.await.unwrap().unwrap();

    sqlx::query("DELETE FROM tasks WHERE created_by = $1")
        .bind(&created_by)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}
