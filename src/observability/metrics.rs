//! Metrics collection and exposition.
//!
//! # Metrics
//! - `huddle_requests_total` (counter): requests by method, status
//! - `huddle_request_duration_seconds` (histogram): latency distribution
//! - `huddle_gate_rejections_total` (counter): gate rejections by reason
//! - `huddle_uploads_total` (counter): accepted uploads by kind, format
//! - `huddle_logins_total` (counter): login attempts by outcome
//! - `huddle_messages_total` (counter): posted messages by kind
//!
//! Without an installed recorder every call below is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    counter!(
        "huddle_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("huddle_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_gate_rejection(reason: &'static str) {
    counter!("huddle_gate_rejections_total", "reason" => reason).increment(1);
}

pub fn record_upload(kind: &'static str, format: &'static str) {
    counter!("huddle_uploads_total", "kind" => kind, "format" => format).increment(1);
}

pub fn record_login(outcome: &'static str) {
    counter!("huddle_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_message(kind: &'static str) {
    counter!("huddle_messages_total", "kind" => kind).increment(1);
}
