//! Metrics collection and exposition.
//!
//! # Metrics
//! - `callback_attempts_total` (counter): POST attempts by classification
//! - `callback_outcomes_total` (counter): finished deliveries by status
//! - `callback_delivery_duration_seconds` (histogram): send() wall time
//! - `callback_credential_failures_total` (counter): rejected tokens by path

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::dispatch::DeliveryStatus;
use crate::resilience::Classification;

/// Start the Prometheus scrape listener on `addr` and register descriptions.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install metrics exporter: {e}"))?;

    describe_counter!("callback_attempts_total", "POST attempts by classification");
    describe_counter!("callback_outcomes_total", "Finished deliveries by final status");
    describe_histogram!(
        "callback_delivery_duration_seconds",
        "Time from send() to final outcome"
    );
    describe_counter!(
        "callback_credential_failures_total",
        "Tokens that could not be decrypted or verified"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_attempt(classification: Classification) {
    counter!("callback_attempts_total", "classification" => classification.as_str()).increment(1);
}

pub fn record_outcome(status: DeliveryStatus, elapsed: Duration) {
    counter!("callback_outcomes_total", "status" => status.as_str()).increment(1);
    histogram!("callback_delivery_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_credential_failure(path: &'static str) {
    counter!("callback_credential_failures_total", "path" => path).increment(1);
}
