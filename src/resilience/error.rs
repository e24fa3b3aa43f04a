//! Pipeline failure taxonomy.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Which timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutScope {
    /// A single attempt ran too long: the downstream is slow.
    Attempt,
    /// The whole execution ran too long, retries and delays included.
    Total,
}

impl fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutScope::Attempt => f.write_str("attempt"),
            TimeoutScope::Total => f.write_str("total"),
        }
    }
}

/// Every way a pipeline execution can end without a value.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    /// The breaker rejected the call; the operation was not invoked.
    #[error("circuit for pipeline '{pipeline}' is open")]
    CircuitOpen { pipeline: String, retry_after: Duration },

    #[error("pipeline '{pipeline}' timed out ({scope} timeout of {after:?})")]
    TimedOut { pipeline: String, scope: TimeoutScope, after: Duration },

    /// `last` is `None` when the final attempt returned a value the
    /// classifier treated as a handled failure.
    #[error("pipeline '{pipeline}' gave up after {attempts} attempts")]
    RetriesExhausted { pipeline: String, attempts: u32, last: Option<E> },

    /// The classifier marked the error unhandled; it was not retried.
    #[error("unhandled failure: {0}")]
    Unhandled(E),

    #[error("pipeline '{pipeline}' cancelled by caller")]
    Cancelled { pipeline: String },

    #[error("no pipeline named '{0}' is configured")]
    UnknownPipeline(String),
}

impl<E> PipelineError<E> {
    /// Stable tag for logs, metrics and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            PipelineError::TimedOut { .. } => "TIMED_OUT",
            PipelineError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            PipelineError::Unhandled(_) => "UNHANDLED",
            PipelineError::Cancelled { .. } => "CANCELLED",
            PipelineError::UnknownPipeline(_) => "UNKNOWN_PIPELINE",
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PipelineError::CircuitOpen { .. })
    }

    pub fn timeout_scope(&self) -> Option<TimeoutScope> {
        match self {
            PipelineError::TimedOut { scope, .. } => Some(*scope),
            _ => None,
        }
    }

    /// The underlying operation error, when there is one.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            PipelineError::RetriesExhausted { last, .. } => last.as_ref(),
            PipelineError::Unhandled(e) => Some(e),
            _ => None,
        }
    }
}
