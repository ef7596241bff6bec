//! Read-only fan-out over the configured namespaces.
//!
//! Each namespace is queried on its own task so a slow or broken store does
//! not block the others. A namespace that fails is logged and left out (task
//! list) or reported with zero counts (stats); only a panicked query task is
//! an error for the whole request.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::TaskerExecutorConfig;
use crate::error::StoreError;
use crate::models::{Task, TaskCounts};
use crate::store::{PgTaskReader, StoreResult, TaskReader};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Internal error while querying namespace {namespace}: {reason}")]
    Internal { namespace: String, reason: String },
}

/// A named, independently reachable task store
#[derive(Clone)]
pub struct Namespace {
    pub name: String,
    pub reader: Arc<dyn TaskReader>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, reader: Arc<dyn TaskReader>) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace").field("name", &self.name).finish()
    }
}

/// A task as shown by the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardTask {
    /// `{namespace}-{id}`, unique across namespaces
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl DashboardTask {
    fn from_task(namespace: &str, task: Task) -> Self {
        Self {
            id: format!("{namespace}-{}", task.id),
            namespace: namespace.to_string(),
            name: task.name,
            status: task.status.to_string(),
            created_by: task.created_by,
            created_at: task.created_at.to_string(),
            completed_at: task.completed_at.map(|ts| ts.to_string()),
        }
    }
}

/// Combined statistics; each namespace's counts also appear under its own name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: i64,
    pub by_namespace: BTreeMap<String, i64>,
    #[serde(flatten)]
    pub namespaces: BTreeMap<String, TaskCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DashboardAggregator {
    namespaces: Vec<Namespace>,
}

impl DashboardAggregator {
    pub fn new(namespaces: Vec<Namespace>) -> Self {
        Self { namespaces }
    }

    /// One lazily connected reader per configured namespace
    pub fn from_config(config: &TaskerExecutorConfig) -> Self {
        let namespaces = config
            .dashboard
            .namespaces
            .iter()
            .map(|ns| {
                let db = config.namespace_database(ns);
                let reader: Arc<dyn TaskReader> = Arc::new(PgTaskReader::new_lazy(&db));
                Namespace::new(ns.name.clone(), reader)
            })
            .collect();
        Self::new(namespaces)
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Every task of every namespace, namespaces in configured order, newest first within each
    pub async fn list_tasks(&self) -> Result<Vec<DashboardTask>, DashboardError> {
        let handles = self.spawn_all(|reader| async move { reader.list_tasks().await });

        let mut all = Vec::new();
        for (namespace, handle) in handles {
            match join(&namespace, handle).await? {
                Ok(tasks) => all.extend(
                    tasks
                        .into_iter()
                        .map(|task| DashboardTask::from_task(&namespace, task)),
                ),
                Err(e) => log_namespace_failure(&namespace, "list_tasks", &e),
            }
        }
        Ok(all)
    }

    pub async fn stats(&self) -> Result<DashboardStats, DashboardError> {
        let handles = self.spawn_all(|reader| async move { reader.stats().await });

        let mut stats = DashboardStats::default();
        for (namespace, handle) in handles {
            let counts = match join(&namespace, handle).await? {
                Ok(counts) => counts,
                Err(e) => {
                    log_namespace_failure(&namespace, "stats", &e);
                    TaskCounts::default()
                }
            };
            stats.total += counts.total;
            stats.by_namespace.insert(namespace.clone(), counts.total);
            stats.namespaces.insert(namespace, counts);
        }
        Ok(stats)
    }

    /// Healthy only if every namespace answers; otherwise the first failure
    pub async fn health(&self) -> HealthReport {
        for namespace in &self.namespaces {
            if let Err(e) = namespace.reader.ping().await {
                log_namespace_failure(&namespace.name, "ping", &e);
                return HealthReport {
                    healthy: false,
                    error: Some(format!("{}: {e}", namespace.name)),
                };
            }
        }
        HealthReport {
            healthy: true,
            error: None,
        }
    }

    fn spawn_all<T, F, Fut>(&self, query: F) -> Vec<(String, JoinHandle<StoreResult<T>>)>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn TaskReader>) -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>> + Send + 'static,
    {
        self.namespaces
            .iter()
            .map(|ns| (ns.name.clone(), tokio::spawn(query(Arc::clone(&ns.reader)))))
            .collect()
    }
}

async fn join<T>(
    namespace: &str,
    handle: JoinHandle<StoreResult<T>>,
) -> Result<StoreResult<T>, DashboardError> {
    handle.await.map_err(|e| DashboardError::Internal {
        namespace: namespace.to_string(),
        reason: e.to_string(),
    })
}

fn log_namespace_failure(namespace: &str, operation: &str, error: &StoreError) {
    warn!(namespace = %namespace, operation = %operation, error = %error, "Namespace query failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::store::{InMemoryTaskStore, TaskStore};
    use async_trait::async_trait;

    struct DownReader;

    #[async_trait]
    impl TaskReader for DownReader {
        async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
            Err(StoreError::unavailable("list_tasks", "connection refused"))
        }
        async fn stats(&self) -> StoreResult<TaskCounts> {
            Err(StoreError::unavailable("stats", "connection refused"))
        }
        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::unavailable("ping", "connection refused"))
        }
    }

    async fn master() -> InMemoryTaskStore {
        let mut store = InMemoryTaskStore::new();
        store.insert(NewTask::new("Task-A-1", "job-a"));
        store.insert(NewTask::new("Task-B-1", "job-b"));
        store.complete(1).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_tasks_are_namespace_qualified() {
        let slave = InMemoryTaskStore::new();
        slave.insert(NewTask::new("Task-A-1", "job-a"));
        let aggregator = DashboardAggregator::new(vec![
            Namespace::new("master", Arc::new(master().await)),
            Namespace::new("slave", Arc::new(slave)),
        ]);

        let tasks = aggregator.list_tasks().await.unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["master-2", "master-1", "slave-1"]);
        assert_eq!(tasks[1].status, "completed");
        assert!(tasks[1].completed_at.is_some());
        assert_eq!(tasks[2].namespace, "slave");
    }

    #[tokio::test]
    async fn test_failing_namespace_is_skipped_and_zeroed() {
        let aggregator = DashboardAggregator::new(vec![
            Namespace::new("master", Arc::new(master().await)),
            Namespace::new("slave", Arc::new(DownReader)),
        ]);

        assert_eq!(aggregator.list_tasks().await.unwrap().len(), 2);

        let stats = aggregator.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_namespace.get("slave"), Some(&0));
        assert_eq!(stats.namespaces["slave"], TaskCounts::default());
        assert_eq!(stats.namespaces["master"].by_creator.get("job-b"), Some(&1));

        let health = aggregator.health().await;
        assert!(!health.healthy);
        assert!(health.error.unwrap().starts_with("slave:"));
    }

    #[tokio::test]
    async fn test_stats_json_shape() {
        let aggregator =
            DashboardAggregator::new(vec![Namespace::new("master", Arc::new(master().await))]);
        let json = serde_json::to_value(aggregator.stats().await.unwrap()).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["by_namespace"]["master"], 2);
        assert_eq!(json["master"]["by_status"]["pending"], 1);
        assert!(aggregator.health().await.healthy);
    }
}
