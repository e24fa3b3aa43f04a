//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_shutdown resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger → admin server stops accepting → in-flight calls drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast coordinator; every long-running task subscribes
//! - Pipelines are not torn down: in-flight executions finish or time out

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
