//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fx_requests_total` (counter): requests by method, status
//! - `fx_request_duration_seconds` (histogram): latency distribution
//! - `fx_mirror_dispatch_total` (counter): mirror deliveries by target, outcome
//! - `fx_mirror_skipped_total` (counter): exchanges not mirrored, by reason
//! - `fx_rates_reloads_total` (counter): rate table reloads by outcome
//!
//! Recording is a no-op until a recorder is installed, so unit tests and
//! deployments with metrics disabled pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [("method", method.to_string()), ("status", status.to_string())];
    metrics::counter!("fx_requests_total", &labels).increment(1);
    metrics::histogram!("fx_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of `delivered`, `failed`, `panicked`.
pub fn record_mirror_dispatch(target: &'static str, outcome: &'static str) {
    metrics::counter!("fx_mirror_dispatch_total", "target" => target, "outcome" => outcome).increment(1);
}

/// `reason` is one of `cache_hit`, `binding`, `capture`.
pub fn record_mirror_skipped(reason: &'static str) {
    metrics::counter!("fx_mirror_skipped_total", "reason" => reason).increment(1);
}

pub fn record_rates_reload(outcome: &'static str) {
    metrics::counter!("fx_rates_reloads_total", "outcome" => outcome).increment(1);
}
