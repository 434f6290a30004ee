//! Transport layer subsystem.
//!
//! # Data Flow
//! ```text
//! Client                                   Server
//!   Dialer::dial(addr, key?)                 Listener::accept()
//!     → Connection                             → Stream (one per request)
//!     → Connection::open_stream(id)            → read fragments / write reply
//!     → Stream::write / read fragments
//! ```
//!
//! # Design Decisions
//! - The protocol layers depend only on the traits in transport.rs
//! - Streams are identified by an explicit numeric id, never by reference
//! - memory.rs backs tests and demos; tcp.rs is an unencrypted development
//!   adapter with one TCP connection per logical stream
//! - dns.rs discovers out-of-band peer keys; failures there are never fatal

pub mod dns;
pub mod memory;
pub mod tcp;
pub mod transport;

pub use transport::{
    Connection, Dialer, Listener, PeerKey, Stream, StreamId, TransportError, TransportResult,
    KEY_LEN, PROTOCOL_VERSION, TRANSPORT_NAME,
};
