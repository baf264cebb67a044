//! Prometheus metrics for the payment server.
//!
//! Installs the global `metrics` recorder and exposes the rendered registry at
//! `GET /metrics` on the main router.

use axum::{Router, routing::get};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Path the registry is rendered at.
pub const METRICS_PATH: &str = "/metrics";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and register metric descriptions.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    tracing::info!(path = METRICS_PATH, "Prometheus recorder installed");
    Ok(handle)
}

/// Router serving the rendered registry.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(METRICS_PATH, get(move || async move { handle.render() }))
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "payment_sessions_created_total",
        "Total number of payment sessions created"
    );
    describe_counter!(
        "payment_sessions_transitions_total",
        "Terminal transitions applied, labelled by resulting status"
    );
    describe_counter!(
        "payment_sessions_conflicts_total",
        "Confirm or cancel requests that found the session already resolved"
    );
    describe_counter!(
        "payment_store_errors_total",
        "Store backend failures, labelled by backend and operation"
    );
    describe_counter!(
        "http_requests_total",
        "HTTP requests served, labelled by method, route and status"
    );
}
