//! Metrics collection and exposition.
//!
//! # Metrics
//! - `quota_gate_admissions_total` (counter): gated requests by `outcome`
//! - `quota_gate_quota_updates_total` (counter): control page updates
//! - `quota_gate_quota_limit` (gauge): quota in force at startup or last set
//!   through the control page
//! - `quota_gate_fatal_faults_total` (counter): handler panics escalated
//! - `quota_gate_upstream_responses_total` (counter): upstream responses by `status`
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admission(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("quota_gate_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_quota_limit(value: i64) {
    metrics::gauge!("quota_gate_quota_limit").set(value as f64);
}

pub fn record_quota_set(value: i64) {
    metrics::counter!("quota_gate_quota_updates_total").increment(1);
    record_quota_limit(value);
}

pub fn record_fatal() {
    metrics::counter!("quota_gate_fatal_faults_total").increment(1);
}

pub fn record_upstream(status: u16) {
    metrics::counter!("quota_gate_upstream_responses_total", "status" => status.to_string())
        .increment(1);
}
