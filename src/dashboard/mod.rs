//! # Dashboard
//!
//! Read-only JSON view over one or more task stores ("namespaces"). The
//! dashboard never writes to a store.

pub mod aggregator;
pub mod web;

pub use aggregator::{
    DashboardAggregator, DashboardError, DashboardStats, DashboardTask, HealthReport, Namespace,
};
pub use web::{router, DashboardState};
