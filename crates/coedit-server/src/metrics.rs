//! Metrics collection and export for Coedit.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use anyhow::Result;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "coedit_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "coedit_connections_active";
    pub const AUTH_REJECTIONS_TOTAL: &str = "coedit_auth_rejections_total";
    pub const EVENTS_TOTAL: &str = "coedit_events_total";
    pub const ROOMS_ACTIVE: &str = "coedit_rooms_active";
    pub const CHANGES_RELAYED_TOTAL: &str = "coedit_changes_relayed_total";
    pub const CHANGE_RECIPIENTS: &str = "coedit_change_recipients";
    pub const LATENCY_SECONDS: &str = "coedit_event_latency_seconds";
    pub const ERRORS_TOTAL: &str = "coedit_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of accepted connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open connections"
    );
    metrics::describe_counter!(
        names::AUTH_REJECTIONS_TOTAL,
        "Connection attempts refused at the handshake"
    );
    metrics::describe_counter!(names::EVENTS_TOTAL, "Events processed, by name and direction");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Documents with at least one viewer");
    metrics::describe_counter!(
        names::CHANGES_RELAYED_TOTAL,
        "Document changes relayed to other viewers"
    );
    metrics::describe_histogram!(
        names::CHANGE_RECIPIENTS,
        "Number of viewers each change was relayed to"
    );
    metrics::describe_histogram!(
        names::LATENCY_SECONDS,
        "Inbound event handling latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a refused handshake.
pub fn record_auth_rejection(reason: &'static str) {
    counter!(names::AUTH_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

/// Record an event crossing the wire.
pub fn record_event(event: &'static str, direction: &'static str) {
    counter!(names::EVENTS_TOTAL, "event" => event, "direction" => direction).increment(1);
}

/// Update the live room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record a relayed change.
pub fn record_relay(recipients: usize) {
    counter!(names::CHANGES_RELAYED_TOTAL).increment(1);
    histogram!(names::CHANGE_RECIPIENTS).record(recipients as f64);
}

/// Record event handling latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_guard() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let guard = ConnectionMetricsGuard::new();
            record_event("join-document", "inbound");
            drop(guard);
        });

        let rendered = handle.render();
        assert!(rendered.contains(names::CONNECTIONS_TOTAL));
        assert!(rendered.contains(names::CONNECTIONS_ACTIVE));
        assert!(rendered.contains(r#"event="join-document""#));
    }
}
