//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → QhConfig (validated, immutable)
//!     → ClientConfig handed to Client, ServerConfig handed to Server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a client or server is built from it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ClientConfig, ObservabilityConfig, QhConfig, ServerConfig};
