//! Prometheus metrics exposition
//!
//! Counters served on `/metrics`:
//!
//! - `api_requests_total` (counter): labels `method`, `status`
//! - `logins_total` (counter): label `outcome`
//! - `token_refreshes_total` (counter): label `outcome`
//!
//! `session_renewals_total` from the client's renewal coordinator lands in
//! the same recorder when the client crates run in this process (tests).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with method and status code labels.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a login attempt outcome ("success" or "failure").
pub fn record_login(outcome: &'static str) {
    metrics::counter!("logins_total", "outcome" => outcome).increment(1);
}

/// Record a refresh exchange outcome ("success" or "failure").
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("token_refreshes_total", "outcome" => outcome).increment(1);
}
