//! # Task Producer
//!
//! Inserts a batch of pending tasks and exits.
//!
//! ```bash
//! task-producer --created-by job-a
//! task-producer --created-by job-b --task Task-B-1 --task Task-B-2
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tasker_executor::config::ConfigManager;
use tasker_executor::logging;
use tasker_executor::models::NewTask;
use tasker_executor::producer::{default_task_names, TaskProducer};

const DEFAULT_BATCH_SIZE: usize = 3;

#[derive(Debug, Parser)]
#[command(name = "task-producer", version, about = "Insert pending tasks into the shared tasks table")]
struct Cli {
    /// Producer identity recorded in `created_by`
    #[arg(long, env = "TASK_CREATED_BY")]
    created_by: String,

    /// Task name to insert; repeat for several. Defaults to three tasks named after the producer.
    #[arg(long = "task", value_name = "NAME")]
    tasks: Vec<String>,

    /// Do not create the tasks table
    #[arg(long)]
    skip_schema: bool,

    /// Connection attempts before giving up
    #[arg(long, default_value_t = 5)]
    connect_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let manager = ConfigManager::load().context("Failed to load configuration")?;
    let config = manager.config();
    logging::init_structured_logging(&config.logging, manager.environment());

    info!(created_by = %cli.created_by, url = %config.database.display_url(), "Producer starting");

    let names = if cli.tasks.is_empty() {
        default_task_names(&cli.created_by, DEFAULT_BATCH_SIZE)
    } else {
        cli.tasks
    };
    let batch: Vec<NewTask> = names
        .into_iter()
        .map(|name| NewTask::new(name, cli.created_by.clone()))
        .collect();

    let producer = TaskProducer::connect_with_retry(
        &config.database,
        cli.connect_attempts,
        config.executor.reconnect_delay(),
    )
    .await
    .context("Failed to connect to the task store")?;

    if !cli.skip_schema {
        producer
            .ensure_schema()
            .await
            .context("Failed to create the tasks table")?;
    }

    let created = producer
        .insert_batch(&batch)
        .await
        .context("Failed to insert tasks")?;

    info!(count = created.len(), created_by = %cli.created_by, "Producer finished");
    producer.pool().close().await;
    Ok(())
}
