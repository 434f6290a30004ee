//! Client request engine.
//!
//! # Data Flow
//! ```text
//! Client::get / post / ... (normalize body, content-length)
//!     → Client::request
//!         → next stream id (atomic counter)
//!         → Request::encode → Stream::write
//!         → Stream::read fragments → StreamBuffer (size ceiling)
//!         → parse_response
//!         → redirect? → redirect.rs (target, follow-up request)
//!                      → reconnect on host change → loop
//!         → decompress per content-encoding
//!     → Response
//! ```
//!
//! # Design Decisions
//! - The stream id counter is the only shared mutable state in steady state
//! - Redirects are followed iteratively, bounded by `max_redirects`
//! - A redirect to another host replaces the live connection; callers must
//!   not issue concurrent requests across such a redirect

pub mod engine;
pub mod redirect;

pub use engine::Client;

use thiserror::Error;

use crate::compression::CompressionError;
use crate::net::dns::ResolveError;
use crate::net::TransportError;
use crate::protocol::WireError;

/// Errors returned by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client not connected")]
    NotConnected,

    /// Address is not `host:port`.
    #[error("invalid address format: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer sent more than `max_response_size` bytes.
    #[error("response size exceeds limit of {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("failed to parse response: {0}")]
    Wire(#[from] WireError),

    #[error("too many redirects (limit {max})")]
    TooManyRedirects { max: usize },

    #[error("redirect response missing location or host/path headers")]
    MissingRedirectTarget,

    #[error("invalid location header: {0}")]
    InvalidLocation(String),

    #[error("decompression failed: {0}")]
    Decompress(#[from] CompressionError),

    /// The stream ended before a complete response arrived.
    #[error("no response received")]
    NoResponse,
}

impl ClientError {
    /// Returns true for application-level rejections (size caps, redirect
    /// limits) as opposed to transport or wire failures.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            ClientError::ResponseTooLarge { .. }
                | ClientError::TooManyRedirects { .. }
                | ClientError::Decompress(CompressionError::SizeLimitExceeded { .. })
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
