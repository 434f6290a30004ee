//! Server dispatch engine.
//!
//! # Data Flow
//! ```text
//! Listener::accept → Stream (one task per stream)
//!     → read fragments → StreamBuffer
//!         → too large        → 413, close stream
//!         → oracle error     → 400, close stream
//!         → complete message → parse_request
//!             → parse error        → 400
//!             → bad content-type   → 415
//!             → Router (path, then method) → handler, or 404
//!             → compression policy
//!         → Response::encode → Stream::write
//! ```
//!
//! # Design Decisions
//! - Each stream owns its buffer; the handler table is read-only while serving
//! - Malformed requests get a 400 so the peer can react, never a silent drop
//! - Compression is skipped unless it actually shrinks the body

pub mod dispatch;
pub mod router;

pub use dispatch::Server;
pub use router::{Handler, Router};
