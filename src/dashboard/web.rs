//! # Dashboard HTTP API
//!
//! - `GET /api/tasks` - `{"tasks": [...]}` across all namespaces
//! - `GET /api/stats` - combined and per-namespace counts
//! - `GET /health` - 200 when every namespace answers, 503 otherwise

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::aggregator::{DashboardAggregator, DashboardError, DashboardStats, DashboardTask};

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub aggregator: Arc<DashboardAggregator>,
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<DashboardTask>,
}

/// 500 with `{"error": ...}`
#[derive(Debug)]
pub struct ApiError(String);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Dashboard request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0 })),
        )
            .into_response()
    }
}

pub fn router(aggregator: Arc<DashboardAggregator>) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks))
        .route("/api/stats", get(stats))
        .route("/health", get(health))
        .with_state(DashboardState { aggregator })
}

async fn list_tasks(State(state): State<DashboardState>) -> Result<Json<TasksResponse>, ApiError> {
    let tasks = state.aggregator.list_tasks().await?;
    Ok(Json(TasksResponse { tasks }))
}

async fn stats(State(state): State<DashboardState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.aggregator.stats().await?))
}

async fn health(State(state): State<DashboardState>) -> Response {
    let report = state.aggregator.health().await;
    match report.error {
        None => (StatusCode::OK, Json(json!({ "status": "healthy" }))).into_response(),
        Some(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": error })),
        )
            .into_response(),
    }
}
