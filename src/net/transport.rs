//! Transport interface consumed by the client and server engines.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;

/// Name used for the out-of-band key record (`_<name>.<host>`).
pub const TRANSPORT_NAME: &str = "qotp";

/// Transport protocol version advertised in key records.
pub const PROTOCOL_VERSION: u32 = 0;

/// Size of a transport public key in bytes.
pub const KEY_LEN: usize = 32;

/// Errors raised by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream or connection was closed by either side.
    #[error("stream closed")]
    Closed,

    #[error("connection refused by {0}")]
    ConnectionRefused(SocketAddr),

    #[error("address already in use: {0}")]
    AddressInUse(SocketAddr),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Logical stream identifier, unique within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A peer's public key, learned out of band.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerKey(pub [u8; KEY_LEN]);

impl PeerKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKey({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// One bidirectional byte stream.
pub trait Stream: Send + 'static {
    fn id(&self) -> StreamId;

    /// Next fragment from the peer. `Ok(None)` once the peer finished writing.
    fn read(&mut self) -> impl Future<Output = TransportResult<Option<Bytes>>> + Send;

    /// Send all of `data`. The peer may receive it in several fragments.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = TransportResult<()>> + Send;

    /// Finish the write side.
    fn close(&mut self) -> impl Future<Output = TransportResult<()>> + Send;
}

/// An established connection that multiplexes streams.
pub trait Connection: Send + Sync + 'static {
    type Stream: Stream;

    fn remote_addr(&self) -> SocketAddr;

    /// Open the stream with `id`. Ids are chosen by the caller and never reused.
    fn open_stream(&self, id: StreamId) -> impl Future<Output = TransportResult<Self::Stream>> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Creates outgoing connections.
pub trait Dialer: Send + Sync + 'static {
    type Connection: Connection;

    /// Connect to `addr`. With a key the handshake is skipped (0-RTT);
    /// without one the transport performs an in-band key exchange.
    fn dial(
        &self,
        addr: SocketAddr,
        key: Option<PeerKey>,
    ) -> impl Future<Output = TransportResult<Self::Connection>> + Send;
}

/// Source of incoming streams on the server side.
pub trait Listener: Send + 'static {
    type Stream: Stream;

    fn local_addr(&self) -> SocketAddr;

    /// Wait for the next stream. `Ok(None)` when the listener is shut.
    fn accept(&mut self) -> impl Future<Output = TransportResult<Option<Self::Stream>>> + Send;
}
