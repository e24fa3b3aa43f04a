//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pipeline_calls_total` (counter): executions by pipeline, outcome
//! - `pipeline_attempts_total` (counter): operation invocations by pipeline
//! - `pipeline_call_duration_seconds` (histogram): execution latency
//! - `circuit_transitions_total` (counter): breaker transitions by target state
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are pipeline name and a fixed outcome vocabulary

use std::net::SocketAddr;
use std::time::Duration;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(pipeline: &str, outcome: &'static str, elapsed: Duration) {
    counter!("pipeline_calls_total", "pipeline" => pipeline.to_string(), "outcome" => outcome).increment(1);
    histogram!("pipeline_call_duration_seconds", "pipeline" => pipeline.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_attempt(pipeline: &str) {
    counter!("pipeline_attempts_total", "pipeline" => pipeline.to_string()).increment(1);
}

pub fn record_transition(pipeline: &str, to: CircuitState) {
    let to = match to {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    };
    counter!("circuit_transitions_total", "pipeline" => pipeline.to_string(), "to" => to).increment(1);
}
