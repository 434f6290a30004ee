//! Development transport over plain TCP.
//!
//! # Design Decisions
//! - One TCP connection per logical stream; the stream id travels only
//!   locally, the server numbers accepted streams itself
//! - No encryption: peer keys are accepted and ignored
//! - Dialing records the address only; connect errors surface on the first
//!   stream

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::net::transport::{
    Connection, Dialer, Listener, PeerKey, Stream, StreamId, TransportError, TransportResult,
};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Dials plain TCP connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Connection = TcpConnection;

    async fn dial(&self, addr: SocketAddr, key: Option<PeerKey>) -> TransportResult<TcpConnection> {
        if key.is_some() {
            tracing::debug!(address = %addr, "TCP transport ignores out-of-band key");
        }
        Ok(TcpConnection {
            remote: addr,
            closed: AtomicBool::new(false),
        })
    }
}

/// A remote address that TCP streams are opened against.
#[derive(Debug)]
pub struct TcpConnection {
    remote: SocketAddr,
    closed: AtomicBool,
}

impl Connection for TcpConnection {
    type Stream = TcpTransportStream;

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    async fn open_stream(&self, id: StreamId) -> TransportResult<TcpTransportStream> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let socket = TcpStream::connect(self.remote).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused(self.remote),
            _ => TransportError::Io(e),
        })?;
        socket.set_nodelay(true)?;

        Ok(TcpTransportStream::new(id, socket))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// A logical stream carried by its own TCP connection.
#[derive(Debug)]
pub struct TcpTransportStream {
    id: StreamId,
    socket: TcpStream,
    buf: Box<[u8]>,
}

impl TcpTransportStream {
    fn new(id: StreamId, socket: TcpStream) -> Self {
        Self {
            id,
            socket,
            buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
        }
    }
}

impl Stream for TcpTransportStream {
    fn id(&self) -> StreamId {
        self.id
    }

    async fn read(&mut self) -> TransportResult<Option<Bytes>> {
        let n = self.socket.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.buf[..n])))
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        self.socket.write_all(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.socket.shutdown().await?;
        Ok(())
    }
}

/// Accepts TCP connections as streams.
#[derive(Debug)]
pub struct TcpTransportListener {
    inner: TcpListener,
    local_addr: SocketAddr,
    next_id: u32,
}

impl TcpTransportListener {
    pub async fn bind(addr: SocketAddr) -> TransportResult<Self> {
        let inner = TcpListener::bind(addr).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AddrInUse => TransportError::AddressInUse(addr),
            _ => TransportError::Io(e),
        })?;
        let local_addr = inner.local_addr()?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner,
            local_addr,
            next_id: 0,
        })
    }
}

impl Listener for TcpTransportListener {
    type Stream = TcpTransportStream;

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn accept(&mut self) -> TransportResult<Option<TcpTransportStream>> {
        let (socket, peer) = self.inner.accept().await?;
        socket.set_nodelay(true)?;

        let id = StreamId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        tracing::debug!(peer = %peer, stream_id = %id, "Stream accepted");
        Ok(Some(TcpTransportStream::new(id, socket)))
    }
}
