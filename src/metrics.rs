//! Metrics for the streaming connection and the seed client.
//!
//! This module provides counters and histograms for:
//! - Inbound frame processing (received, decode errors, dropped)
//! - Outbound requests (sent immediately vs. buffered)
//! - Transport reconnects
//! - Dispatch and seed fetch latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Frames received from the transport.
pub const METRIC_WS_FRAMES_RECEIVED: &str = "ws_frames_received_total";
/// Frames that failed to decode.
pub const METRIC_WS_DECODE_ERRORS: &str = "ws_decode_errors_total";
/// Decoded messages nobody consumed.
pub const METRIC_WS_MESSAGES_DROPPED: &str = "ws_messages_dropped_total";
/// Transport reconnects.
pub const METRIC_WS_RECONNECTS: &str = "ws_reconnects_total";
/// Requests written to an open transport.
pub const METRIC_WS_REQUESTS_SENT: &str = "ws_requests_sent_total";
/// Requests queued while the transport was not open.
pub const METRIC_WS_REQUESTS_BUFFERED: &str = "ws_requests_buffered_total";
/// Time to decode and dispatch one frame.
pub const METRIC_WS_DISPATCH_LATENCY: &str = "ws_dispatch_latency_ms";
/// Seed HTTP fetch latency.
pub const METRIC_SEED_FETCH_LATENCY: &str = "seed_fetch_latency_ms";
/// Seed HTTP fetch failures.
pub const METRIC_SEED_FETCH_ERRORS: &str = "seed_fetch_errors_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_WS_FRAMES_RECEIVED,
        "Total number of WebSocket frames received"
    );
    describe_counter!(
        METRIC_WS_DECODE_ERRORS,
        "Total number of WebSocket frames that failed to decode"
    );
    describe_counter!(
        METRIC_WS_MESSAGES_DROPPED,
        "Total number of decoded messages with no consumer"
    );
    describe_counter!(
        METRIC_WS_RECONNECTS,
        "Total number of WebSocket reconnections"
    );
    describe_counter!(
        METRIC_WS_REQUESTS_SENT,
        "Total number of requests written to the transport"
    );
    describe_counter!(
        METRIC_WS_REQUESTS_BUFFERED,
        "Total number of requests buffered until the transport opened"
    );
    describe_histogram!(
        METRIC_WS_DISPATCH_LATENCY,
        "Frame decode and dispatch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SEED_FETCH_LATENCY,
        "Seed snapshot fetch latency in milliseconds"
    );
    describe_counter!(
        METRIC_SEED_FETCH_ERRORS,
        "Total number of failed seed snapshot fetches"
    );

    debug!("Metrics initialized");
}

/// Increment frames received counter.
pub fn inc_ws_frames_received() {
    counter!(METRIC_WS_FRAMES_RECEIVED).increment(1);
}

/// Increment decode errors counter.
pub fn inc_ws_decode_errors() {
    counter!(METRIC_WS_DECODE_ERRORS).increment(1);
}

/// Increment dropped messages counter.
pub fn inc_ws_messages_dropped(reason: &'static str) {
    counter!(METRIC_WS_MESSAGES_DROPPED, "reason" => reason).increment(1);
}

/// Increment WebSocket reconnects counter.
pub fn inc_ws_reconnects() {
    counter!(METRIC_WS_RECONNECTS).increment(1);
}

/// Increment requests sent counter.
pub fn inc_ws_requests_sent() {
    counter!(METRIC_WS_REQUESTS_SENT).increment(1);
}

/// Increment requests buffered counter.
pub fn inc_ws_requests_buffered() {
    counter!(METRIC_WS_REQUESTS_BUFFERED).increment(1);
}

/// Record seed fetch latency.
pub fn record_seed_fetch_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_SEED_FETCH_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Increment seed fetch errors counter.
pub fn inc_seed_fetch_errors(endpoint: &str) {
    counter!(METRIC_SEED_FETCH_ERRORS, "endpoint" => endpoint.to_string()).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for frame dispatch.
pub fn timer_ws_dispatch() -> LatencyTimer {
    LatencyTimer::new(METRIC_WS_DISPATCH_LATENCY)
}
