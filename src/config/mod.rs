//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → PipelineRegistry::from_config builds one definition per name
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Top-level sections have defaults; per-pipeline policy blocks do not
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{PipelineConfig, ServiceConfig};
