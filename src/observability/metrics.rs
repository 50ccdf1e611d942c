//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_refresh_total` (counter): refresh cycles by route, outcome
//! - `gateway_refresh_duration_seconds` (histogram): time spent refreshing
//! - `gateway_session_recreate_total` (counter): session replacements by route, result
//! - `gateway_requests_served_total` (counter): responses delivered by route
//! - `gateway_batch_size` (histogram): requests answered per cycle
//! - `gateway_cached_revision` (gauge): revision the cache is current for
//!
//! Recording is a no-op until a recorder is installed, so tests need no setup.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_refresh(route: &str, outcome: &'static str, start: Instant) {
    counter!("gateway_refresh_total", "route" => route.to_string(), "outcome" => outcome).increment(1);
    histogram!("gateway_refresh_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_session_recreate(route: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("gateway_session_recreate_total", "route" => route.to_string(), "result" => result).increment(1);
}

pub fn record_batch(route: &str, size: usize) {
    counter!("gateway_requests_served_total", "route" => route.to_string()).increment(size as u64);
    histogram!("gateway_batch_size", "route" => route.to_string()).record(size as f64);
}

pub fn record_cached_revision(route: &str, revision: u64) {
    gauge!("gateway_cached_revision", "route" => route.to_string()).set(revision as f64);
}
