//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → SupervisorConfig (validated, immutable)
//!     → ServerSupervisor::from_config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a supervisor is built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ShutdownConfig, SupervisorConfig};
pub use validation::{validate_config, ValidationError};
