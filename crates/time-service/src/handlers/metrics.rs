//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated so Prometheus can scrape it. Metrics
//! carry only bounded operational labels: no tokens, client ids or key ids.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE ts_token_validations_total counter
/// ts_token_validations_total{outcome="valid",claim="none"} 42
/// ```
#[tracing::instrument(skip_all, name = "ts.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
