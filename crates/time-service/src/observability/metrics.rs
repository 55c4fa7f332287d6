//! Metrics definitions for the time service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ts_` prefix for the time service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: known paths, everything else is `/other`
//! - `outcome`: `valid` plus one value per rejection reason
//! - `status`: `success` / `error`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Fails if bucket configuration is rejected or a recorder is already
/// installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ts_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("ts_jwks_refresh_duration_seconds".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `ts_http_requests_total`, `ts_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code` / `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("ts_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("ts_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/gettime" => "/gettime",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record one token validation outcome
///
/// Metric: `ts_token_validations_total`
/// Labels: `outcome` (`valid`, `malformed`, `unknown_signer`, `bad_signature`,
/// `claim_rejected`, `key_set_unavailable`), `claim`
pub fn record_token_validation(outcome: &'static str, claim: Option<&'static str>) {
    counter!("ts_token_validations_total",
        "outcome" => outcome,
        "claim" => claim.unwrap_or("none")
    )
    .increment(1);
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record a key-set fetch
///
/// Metric: `ts_jwks_refresh_total`, `ts_jwks_refresh_duration_seconds`
/// Labels: `status` (`success`, `error`), `trigger` (`initial`, `expired`, `miss`)
pub fn record_jwks_refresh(status: &'static str, trigger: &'static str, duration: Duration) {
    histogram!("ts_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("ts_jwks_refresh_total",
        "status" => status,
        "trigger" => trigger
    )
    .increment(1);
}

/// Record a refresh-on-miss suppressed by the minimum refresh interval
///
/// Metric: `ts_jwks_refresh_throttled_total`
pub fn record_jwks_refresh_throttled() {
    counter!("ts_jwks_refresh_throttled_total").increment(1);
}
