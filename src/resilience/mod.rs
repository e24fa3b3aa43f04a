//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller → registry.rs (resolve named pipeline, lazily built)
//!     → pipeline.rs total timeout (timeouts.rs, bounds everything below)
//!         → per attempt:
//!             circuit_breaker.rs (admit / reject, HalfOpen trial gate)
//!             → timeouts.rs per-attempt guard → operation
//!             → outcome.rs (classify value / error / timeout)
//!             → circuit_breaker.rs (record into rolling window)
//!         → retries.rs (stop, give up, or wait backoff.rs delay and loop)
//!     → observability::stats (one recorded call per execution)
//! ```
//!
//! # Design Decisions
//! - Composition order is fixed: TotalTimeout(Breaker(Retry(AttemptTimeout(op))))
//! - Every retry re-enters the breaker; a rejection ends the execution
//! - Open → HalfOpen is lazy, evaluated on the next incoming call
//! - Breaker state is process-local, one breaker per pipeline name
//! - Caller cancellation is distinct from self-imposed timeouts

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use backoff::{Backoff, BackoffKind};
pub use circuit_breaker::{
    BreakerOptions, BreakerSnapshot, CircuitBreaker, CircuitObserver, CircuitState, NoopObserver,
    Transition,
};
pub use error::{PipelineError, TimeoutScope};
pub use outcome::{AttemptResult, Classifier, Outcome};
pub use pipeline::{AttemptContext, Pipeline, PipelineOptions};
pub use registry::{PipelineRegistry, PipelineSnapshot, PolicySummary};
pub use retries::{RetryDecision, RetryPolicy};
pub use timeouts::TimeoutSpec;
