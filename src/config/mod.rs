//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → XprssoConfig (validated, immutable)
//!     → demo server: listener, query source, options bag, logging
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks
//! - `[options.*]` tables are handed to `add_options` unchanged

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, QueryConfig, TimeoutConfig, XprssoConfig};
pub use validation::{validate_config, ValidationError};
