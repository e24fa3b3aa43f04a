//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipelines produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms; Prometheus when enabled)
//!     → stats.rs (per-pipeline call counters for the dashboard)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint
//!     → admin dashboard (/api/dashboard)
//! ```
//!
//! # Design Decisions
//! - Stats are always on; metrics export is optional
//! - Counters are atomic, no global lock

pub mod logging;
pub mod metrics;
pub mod stats;
