//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::compression::{Encoding, DEFAULT_ENCODINGS};

const MIB: usize = 1024 * 1024;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct QhConfig {
    /// Client request engine settings.
    pub client: ClientConfig,

    /// Server dispatch settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Client request engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Largest response, in bytes, accepted on the wire or after decompression.
    pub max_response_size: usize,

    /// Redirects followed before giving up.
    pub max_redirects: usize,

    /// Encodings advertised in `accept-encoding`, in preference order.
    pub supported_encodings: Vec<Encoding>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_response_size: 50 * MIB,
            max_redirects: 10,
            supported_encodings: DEFAULT_ENCODINGS.to_vec(),
        }
    }
}

/// Server dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind_address: String,

    /// Largest request, in bytes, buffered per stream.
    pub max_request_size: usize,

    /// Bodies smaller than this are never compressed.
    pub min_compression_size: usize,

    /// Encodings the server is willing to produce.
    pub supported_encodings: Vec<Encoding>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
            max_request_size: 10 * MIB,
            min_compression_size: 1024,
            supported_encodings: DEFAULT_ENCODINGS.to_vec(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}
