//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resilience::backoff::BackoffKind;

/// Root configuration for the resilience service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Admin / dashboard HTTP surface.
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Named pipeline definitions.
    pub pipelines: BTreeMap<String, PipelineConfig>,
}

impl ServiceConfig {
    /// The three demonstration pipelines, all pointing at a local flaky
    /// service on port 8080.
    pub fn demo() -> Self {
        let downstream = Some("http://localhost:8080/".to_string());
        let mut pipelines = BTreeMap::new();

        pipelines.insert(
            "standard".to_string(),
            PipelineConfig {
                downstream_url: downstream.clone(),
                circuit_breaker: CircuitBreakerConfig {
                    sampling_duration_ms: 30_000,
                    failure_ratio: 0.5,
                    minimum_throughput: 3,
                    break_duration_ms: 15_000,
                },
                retry: RetryConfig::exponential(2, 500),
                timeouts: TimeoutConfig { attempt_timeout_ms: 2_000, total_timeout_ms: 10_000 },
            },
        );

        pipelines.insert(
            "custom".to_string(),
            PipelineConfig {
                downstream_url: downstream.clone(),
                circuit_breaker: CircuitBreakerConfig {
                    sampling_duration_ms: 20_000,
                    failure_ratio: 0.4,
                    minimum_throughput: 2,
                    break_duration_ms: 30_000,
                },
                retry: RetryConfig::exponential(0, 500),
                timeouts: TimeoutConfig { attempt_timeout_ms: 2_000, total_timeout_ms: 5_000 },
            },
        );

        pipelines.insert(
            "generic".to_string(),
            PipelineConfig {
                downstream_url: downstream,
                circuit_breaker: CircuitBreakerConfig {
                    sampling_duration_ms: 30_000,
                    failure_ratio: 0.5,
                    minimum_throughput: 3,
                    break_duration_ms: 15_000,
                },
                retry: RetryConfig::exponential(2, 500),
                timeouts: TimeoutConfig { attempt_timeout_ms: 2_000, total_timeout_ms: 10_000 },
            },
        );

        Self { pipelines, ..Self::default() }
    }
}

/// One named pipeline. The policy blocks carry no defaults: every
/// pipeline states its own numbers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Target for `/api/call/{name}`; absent for library-only pipelines.
    #[serde(default)]
    pub downstream_url: Option<String>,

    pub circuit_breaker: CircuitBreakerConfig,

    pub retry: RetryConfig,

    pub timeouts: TimeoutConfig,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Length of the sliding outcome window.
    pub sampling_duration_ms: u64,

    /// Failure ratio in (0, 1] at which the circuit opens.
    pub failure_ratio: f64,

    /// Outcomes required in the window before the ratio is evaluated.
    pub minimum_throughput: u32,

    /// How long the circuit stays open before a trial call.
    pub break_duration_ms: u64,
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_attempts: u32,

    pub base_delay_ms: u64,

    pub backoff: BackoffKind,

    /// Upper bound on any single delay.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Add up to 10% random jitter to each delay.
    #[serde(default)]
    pub jitter: bool,
}

impl RetryConfig {
    fn exponential(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            backoff: BackoffKind::Exponential,
            max_delay_ms: None,
            jitter: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Bound on a single attempt.
    pub attempt_timeout_ms: u64,

    /// Bound on the whole execution, retries and delays included.
    pub total_timeout_ms: u64,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the dashboard and invocation endpoints.
    pub enabled: bool,

    /// Admin dashboard bind address.
    pub bind_address: String,

    /// Bearer token required on `/admin/*` when set.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
        }
    }
}
