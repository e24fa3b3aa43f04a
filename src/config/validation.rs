//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ratios, throughput, durations > 0)
//! - Check timeout nesting (attempt timeout within total timeout)
//! - Validate addresses and downstream URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{PipelineConfig, ServiceConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("pipeline name must not be empty")]
    EmptyPipelineName,

    #[error("pipeline '{pipeline}': failure_ratio {value} must be in (0, 1]")]
    FailureRatio { pipeline: String, value: f64 },

    #[error("pipeline '{pipeline}': minimum_throughput must be at least 1")]
    MinimumThroughput { pipeline: String },

    #[error("pipeline '{pipeline}': {field} must be greater than zero")]
    ZeroDuration { pipeline: String, field: &'static str },

    #[error("pipeline '{pipeline}': attempt timeout {attempt_ms}ms exceeds total timeout {total_ms}ms")]
    AttemptExceedsTotal { pipeline: String, attempt_ms: u64, total_ms: u64 },

    #[error("pipeline '{pipeline}': max_delay_ms {max_ms} is below base_delay_ms {base_ms}")]
    MaxDelayBelowBase { pipeline: String, max_ms: u64, base_ms: u64 },

    #[error("pipeline '{pipeline}': invalid downstream_url '{url}'")]
    DownstreamUrl { pipeline: String, url: String },

    #[error("{field}: invalid bind address '{value}'")]
    BindAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    for (name, pipeline) in &config.pipelines {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyPipelineName);
        }
        validate_pipeline(&mut errors, name, pipeline);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_pipeline(errors: &mut Vec<ValidationError>, name: &str, pipeline: &PipelineConfig) {
    let cb = &pipeline.circuit_breaker;
    if !(cb.failure_ratio > 0.0 && cb.failure_ratio <= 1.0) {
        errors.push(ValidationError::FailureRatio { pipeline: name.to_string(), value: cb.failure_ratio });
    }
    if cb.minimum_throughput == 0 {
        errors.push(ValidationError::MinimumThroughput { pipeline: name.to_string() });
    }

    let durations = [
        ("circuit_breaker.sampling_duration_ms", cb.sampling_duration_ms),
        ("circuit_breaker.break_duration_ms", cb.break_duration_ms),
        ("timeouts.attempt_timeout_ms", pipeline.timeouts.attempt_timeout_ms),
        ("timeouts.total_timeout_ms", pipeline.timeouts.total_timeout_ms),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { pipeline: name.to_string(), field });
        }
    }
    if pipeline.retry.max_attempts > 0 && pipeline.retry.base_delay_ms == 0 {
        errors.push(ValidationError::ZeroDuration { pipeline: name.to_string(), field: "retry.base_delay_ms" });
    }

    let timeouts = &pipeline.timeouts;
    if timeouts.attempt_timeout_ms > timeouts.total_timeout_ms {
        errors.push(ValidationError::AttemptExceedsTotal {
            pipeline: name.to_string(),
            attempt_ms: timeouts.attempt_timeout_ms,
            total_ms: timeouts.total_timeout_ms,
        });
    }

    if let Some(max_ms) = pipeline.retry.max_delay_ms {
        if max_ms < pipeline.retry.base_delay_ms {
            errors.push(ValidationError::MaxDelayBelowBase {
                pipeline: name.to_string(),
                max_ms,
                base_ms: pipeline.retry.base_delay_ms,
            });
        }
    }

    if let Some(url) = &pipeline.downstream_url {
        let valid = Url::parse(url).map(|u| matches!(u.scheme(), "http" | "https")).unwrap_or(false);
        if !valid {
            errors.push(ValidationError::DownstreamUrl { pipeline: name.to_string(), url: url.clone() });
        }
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress { field, value: value.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::demo()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServiceConfig::demo();
        let standard = config.pipelines.get_mut("standard").unwrap();
        standard.circuit_breaker.failure_ratio = 0.0;
        standard.circuit_breaker.minimum_throughput = 0;
        standard.timeouts.attempt_timeout_ms = 20_000;
        standard.retry.max_delay_ms = Some(100);
        standard.downstream_url = Some("ftp://nowhere".to_string());
        config.admin.bind_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::MinimumThroughput { pipeline: "standard".to_string() }));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::AttemptExceedsTotal { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::BindAddress { .. })));
    }

    #[test]
    fn ratio_of_one_is_allowed() {
        let mut config = ServiceConfig::demo();
        config.pipelines.get_mut("custom").unwrap().circuit_breaker.failure_ratio = 1.0;
        assert!(validate_config(&config).is_ok());

        config.pipelines.get_mut("custom").unwrap().circuit_breaker.failure_ratio = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let mut config = ServiceConfig::demo();
        config.pipelines.get_mut("generic").unwrap().circuit_breaker.break_duration_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ZeroDuration {
                pipeline: "generic".to_string(),
                field: "circuit_breaker.break_duration_ms",
            }]
        );
    }
}
