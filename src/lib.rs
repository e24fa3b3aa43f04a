//! Resilience pipeline library.
//!
//! Protects callers from failing or slow downstream dependencies by running
//! every remote operation through a named pipeline of circuit breaker, retry
//! and timeout policies, with per-pipeline call statistics.

pub mod admin;
pub mod config;
pub mod downstream;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ServiceConfig;
pub use lifecycle::Shutdown;
pub use observability::stats::{PipelineStats, StatsTracker};
pub use resilience::{
    AttemptContext, CircuitState, Pipeline, PipelineError, PipelineOptions, PipelineRegistry,
};
