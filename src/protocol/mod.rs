//! QH wire protocol.
//!
//! # Data Flow
//! ```text
//! Request ──► encode ──► bytes ──► transport fragments
//!                                        │
//!                                        ▼
//!                         StreamBuffer (completeness oracle)
//!                                        │ complete
//!                                        ▼
//!                              parse_request / parse_response
//! ```
//!
//! # Design Decisions
//! - All lengths are varints, validated against the remaining buffer before use
//! - Headers compress through per-direction static tables with a raw fallback
//! - Status codes travel as a 6-bit index into a frequency-ordered table
//! - Decoding copies out of the input so messages own their data

pub mod codec;
pub mod debug;
pub mod framing;
pub mod headers;
pub mod status;
pub mod types;
pub mod varint;

pub use codec::{parse_request, parse_response};
pub use debug::{debug_request, debug_response};
pub use framing::{
    is_request_complete, is_response_complete, FrameError, MessageKind, StreamBuffer,
};
pub use types::{
    accept_header, ContentType, Method, Request, Response, WireError, MAX_HOST_LEN, VERSION,
};
