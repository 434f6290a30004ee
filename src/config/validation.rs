//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, bind address parses)
//! - Detect duplicate encodings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: QhConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::compression::Encoding;
use crate::config::schema::QhConfig;
use crate::observability::logging::LogFormat;

/// One semantic problem with a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed config, collecting every error.
pub fn validate_config(config: &QhConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.max_response_size == 0 {
        errors.push(ValidationError::new("client.max_response_size", "must be greater than 0"));
    }
    check_encodings(
        "client.supported_encodings",
        &config.client.supported_encodings,
        &mut errors,
    );

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("invalid socket address '{}'", config.server.bind_address),
        ));
    }
    if config.server.max_request_size == 0 {
        errors.push(ValidationError::new("server.max_request_size", "must be greater than 0"));
    }
    check_encodings(
        "server.supported_encodings",
        &config.server.supported_encodings,
        &mut errors,
    );

    if LogFormat::parse(&config.observability.log_format).is_none() {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", config.observability.log_format),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_encodings(field: &str, encodings: &[Encoding], errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for encoding in encodings {
        if !seen.insert(encoding) {
            errors.push(ValidationError::new(field, format!("duplicate encoding '{encoding}'")));
        }
    }
}
