//! Metric names and recording helpers.
//!
//! Recording goes through the `metrics` facade and is a no-op until the
//! server installs an exporter.

use metrics::{counter, gauge, histogram};

/// Metric names.
pub mod names {
    pub const PRODUCERS_ACTIVE: &str = "tilt_producers_active";
    pub const CONSUMERS_ACTIVE: &str = "tilt_consumers_active";
    pub const SAMPLES_TOTAL: &str = "tilt_samples_total";
    pub const BROADCASTS_TOTAL: &str = "tilt_broadcasts_total";
    pub const BROADCAST_BYTES: &str = "tilt_broadcast_bytes_total";
    pub const BROADCAST_RECIPIENTS: &str = "tilt_broadcast_recipients";
    pub const CONSUMERS_DROPPED_TOTAL: &str = "tilt_consumers_dropped_total";
    pub const EVICTIONS_TOTAL: &str = "tilt_evictions_total";
    pub const ERRORS_TOTAL: &str = "tilt_errors_total";
}

/// Record an accepted producer sample.
pub fn record_sample() {
    counter!(names::SAMPLES_TOTAL).increment(1);
}

/// Update the active producer count.
pub fn set_producers_active(count: usize) {
    gauge!(names::PRODUCERS_ACTIVE).set(count as f64);
}

/// Update the active consumer count.
pub fn set_consumers_active(count: usize) {
    gauge!(names::CONSUMERS_ACTIVE).set(count as f64);
}

/// Record one broadcast.
pub fn record_broadcast(recipients: usize, delivered: usize, payload_bytes: usize) {
    counter!(names::BROADCASTS_TOTAL).increment(1);
    counter!(names::BROADCAST_BYTES).increment((payload_bytes * delivered) as u64);
    histogram!(names::BROADCAST_RECIPIENTS).record(recipients as f64);
}

/// Record a consumer deregistered by a failed send.
pub fn record_consumer_dropped(reason: &'static str) {
    counter!(names::CONSUMERS_DROPPED_TOTAL, "reason" => reason).increment(1);
}

/// Record evicted producers.
pub fn record_evictions(count: usize) {
    counter!(names::EVICTIONS_TOTAL).increment(count as u64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}
