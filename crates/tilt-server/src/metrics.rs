//! Metrics export for tilt-relay.
//!
//! Hub metrics are recorded in `tilt-core`; this module adds per-connection
//! metrics and exports everything in Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tilt_core::metrics::names as hub;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "tilt_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "tilt_connections_active";
    pub const MESSAGES_TOTAL: &str = "tilt_messages_total";
    pub const MESSAGES_BYTES: &str = "tilt_messages_bytes";
    pub const LATENCY_SECONDS: &str = "tilt_latency_seconds";
}

/// Which endpoint a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Orientation producers.
    Producer,
    /// Visualization consumers.
    Consumer,
}

impl Endpoint {
    /// Label value for this endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Producer => "producer",
            Endpoint::Consumer => "consumer",
        }
    }
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of messages processed");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Total bytes of messages processed");
    metrics::describe_histogram!(
        names::LATENCY_SECONDS,
        "Producer message processing latency in seconds"
    );
    metrics::describe_counter!(hub::ERRORS_TOTAL, "Total number of errors");

    metrics::describe_gauge!(hub::PRODUCERS_ACTIVE, "Producers held in the state store");
    metrics::describe_gauge!(hub::CONSUMERS_ACTIVE, "Registered consumers");
    metrics::describe_counter!(hub::SAMPLES_TOTAL, "Producer samples accepted");
    metrics::describe_counter!(hub::BROADCASTS_TOTAL, "Aggregate broadcasts");
    metrics::describe_counter!(
        hub::BROADCAST_BYTES,
        "Aggregate bytes published to consumers"
    );
    metrics::describe_histogram!(
        hub::BROADCAST_RECIPIENTS,
        "Consumers attempted per broadcast"
    );
    metrics::describe_counter!(
        hub::CONSUMERS_DROPPED_TOTAL,
        "Consumers deregistered after a failed send"
    );
    metrics::describe_counter!(hub::EVICTIONS_TOTAL, "Stale producers evicted");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a message.
pub fn record_message(bytes: usize, direction: &'static str) {
    counter!(names::MESSAGES_TOTAL, "direction" => direction).increment(1);
    counter!(names::MESSAGES_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record producer message latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    tilt_core::metrics::record_error(error_type);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard {
    endpoint: Endpoint,
}

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        let label = endpoint.as_str();
        counter!(names::CONNECTIONS_TOTAL, "endpoint" => label).increment(1);
        gauge!(names::CONNECTIONS_ACTIVE, "endpoint" => label).increment(1.0);
        Self { endpoint }
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONNECTIONS_ACTIVE, "endpoint" => self.endpoint.as_str()).decrement(1.0);
    }
}
