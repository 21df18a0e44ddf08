//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, assign generated ids)
//!     → validation.rs (semantic checks, framework version gate)
//!     → BridgeConfig (validated, immutable)
//!     → one ServerConfig handed to each stream server instance
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no runtime reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Config errors surface at load time, never from a running tick

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BridgeConfig, FrameworkVersion, ObservabilityConfig, SchedulerConfig, SerialConfig,
    ServerConfig, DEFAULT_PORT,
};
pub use validation::{validate_config, validate_server, ValidationError};
