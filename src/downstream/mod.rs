//! Downstream HTTP dependency.
//!
//! # Data Flow
//! ```text
//! admin /api/call/{name}
//!     → PipelineRegistry::execute
//!     → client.rs (one GET per attempt, token-aware)
//!     → http_classifier (status / transport → Outcome)
//! ```
//!
//! # Design Decisions
//! - Non-2xx responses surface as errors so the classifier sees them
//! - Any other error type reaching the classifier is a caller bug (unhandled)

pub mod client;

pub use client::{http_classifier, DownstreamClient, DownstreamError};
