//! Protocol metrics.
//!
//! # Metrics
//! - `qh_requests_total` (counter): handled requests by method, status
//! - `qh_request_duration_seconds` (histogram): handler latency by method
//! - `qh_parse_errors_total` (counter): malformed messages by side
//! - `qh_compressed_responses_total` (counter): by encoding
//! - `qh_compression_saved_bytes` (histogram): bytes saved per response
//! - `qh_redirects_total` (counter): redirects followed by status

use std::time::Instant;

use crate::compression::Encoding;
use crate::protocol::Method;

/// Which end saw a malformed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

pub fn record_request(method: Method, status: u16, started: Instant) {
    metrics::counter!(
        "qh_requests_total",
        "method" => method.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("qh_request_duration_seconds", "method" => method.as_str())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_parse_error(side: Side) {
    metrics::counter!("qh_parse_errors_total", "side" => side.as_str()).increment(1);
}

pub fn record_compression(encoding: Encoding, original: usize, compressed: usize) {
    metrics::counter!("qh_compressed_responses_total", "encoding" => encoding.as_str())
        .increment(1);
    metrics::histogram!("qh_compression_saved_bytes", "encoding" => encoding.as_str())
        .record(original.saturating_sub(compressed) as f64);
}

pub fn record_redirect(status: u16) {
    metrics::counter!("qh_redirects_total", "status" => status.to_string()).increment(1);
}
