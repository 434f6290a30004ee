//! Startup orchestration.
//!
//! # Responsibilities
//! - Locate the config file (argument, then `QH_CONFIG`, then defaults)
//! - Load and validate it
//! - Initialize logging from the result
//!
//! # Design Decisions
//! - Fail fast: an unreadable or invalid file is fatal, a missing path is not

use std::path::{Path, PathBuf};

use crate::config::{load_config, ConfigError, QhConfig};
use crate::observability::logging::init_logging;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "QH_CONFIG";

/// Pick the config path: explicit argument first, then `QH_CONFIG`.
pub fn config_path(arg: Option<PathBuf>) -> Option<PathBuf> {
    arg.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

/// Load config from `path`, or defaults when there is none.
pub fn load(path: Option<&Path>) -> Result<QhConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(QhConfig::default()),
    }
}

/// Load config and bring up logging.
pub fn init(path: Option<&Path>) -> Result<QhConfig, ConfigError> {
    let config = load(path)?;
    init_logging(&config.observability);

    match path {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("No config file given, using defaults"),
    }
    tracing::info!(
        bind_address = %config.server.bind_address,
        max_request_size = config.server.max_request_size,
        min_compression_size = config.server.min_compression_size,
        "Server configuration"
    );
    Ok(config)
}
