//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stream_server_connected` (gauge): 1 while an instance has a client
//! - `stream_server_connections` (gauge): clients per instance
//! - `stream_server_serial_rx_bytes_total` (counter): bytes read from the UART
//! - `stream_server_serial_tx_bytes_total` (counter): bytes written to the UART
//! - `stream_server_dropped_bytes_total` (counter): serial bytes lost to slow clients
//! - `stream_server_transport_errors_total` (counter): UART failures by direction

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Publish the client set of one server instance.
pub fn publish_clients(server: &str, count: usize) {
    let connected = if count > 0 { 1.0 } else { 0.0 };
    gauge!("stream_server_connected", "server" => server.to_string()).set(connected);
    gauge!("stream_server_connections", "server" => server.to_string()).set(count as f64);
}

pub fn record_serial_rx(bytes: usize) {
    counter!("stream_server_serial_rx_bytes_total").increment(bytes as u64);
}

pub fn record_serial_tx(bytes: usize) {
    counter!("stream_server_serial_tx_bytes_total").increment(bytes as u64);
}

pub fn record_dropped(server: &str, bytes: usize) {
    counter!("stream_server_dropped_bytes_total", "server" => server.to_string())
        .increment(bytes as u64);
}

/// `direction` is `"read"` or `"write"`.
pub fn record_transport_error(direction: &'static str) {
    counter!("stream_server_transport_errors_total", "direction" => direction).increment(1);
}
