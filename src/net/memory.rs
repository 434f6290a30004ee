//! In-process transport.
//!
//! Streams are pairs of unbounded channels. Writes are split into fragments
//! of a fixed size so readers see the same partial delivery a datagram
//! transport would produce.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::net::transport::{
    Connection, Dialer, Listener, PeerKey, Stream, StreamId, TransportError, TransportResult,
};

/// Fragment size used unless configured otherwise.
pub const DEFAULT_FRAGMENT_SIZE: usize = 1200;

struct NetworkInner {
    listeners: DashMap<SocketAddr, mpsc::UnboundedSender<MemoryStream>>,
    /// Keys presented by each dial, per target address.
    dials: DashMap<SocketAddr, Vec<Option<PeerKey>>>,
    fragment_size: usize,
}

/// A process-local network of listeners addressed by socket address.
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::with_fragment_size(DEFAULT_FRAGMENT_SIZE)
    }

    /// Network whose streams deliver at most `fragment_size` bytes per read.
    pub fn with_fragment_size(fragment_size: usize) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                listeners: DashMap::new(),
                dials: DashMap::new(),
                fragment_size: fragment_size.max(1),
            }),
        }
    }

    /// Bind a listener to `addr`.
    pub fn listen(&self, addr: SocketAddr) -> TransportResult<MemoryListener> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.listeners.entry(addr) {
            Entry::Occupied(_) => return Err(TransportError::AddressInUse(addr)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        tracing::debug!(address = %addr, "Memory listener bound");
        Ok(MemoryListener {
            addr,
            rx,
            network: Arc::clone(&self.inner),
        })
    }

    /// Keys presented by every dial to `addr` so far, in order.
    pub fn dial_keys(&self, addr: SocketAddr) -> Vec<Option<PeerKey>> {
        self.inner
            .dials
            .get(&addr)
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer for MemoryNetwork {
    type Connection = MemoryConnection;

    async fn dial(&self, addr: SocketAddr, key: Option<PeerKey>) -> TransportResult<MemoryConnection> {
        self.inner.dials.entry(addr).or_default().push(key);

        let incoming = self
            .inner
            .listeners
            .get(&addr)
            .map(|tx| tx.clone())
            .ok_or(TransportError::ConnectionRefused(addr))?;

        Ok(MemoryConnection {
            remote: addr,
            incoming,
            fragment_size: self.inner.fragment_size,
            closed: AtomicBool::new(false),
        })
    }
}

/// Client side of an in-process connection.
pub struct MemoryConnection {
    remote: SocketAddr,
    incoming: mpsc::UnboundedSender<MemoryStream>,
    fragment_size: usize,
    closed: AtomicBool,
}

impl Connection for MemoryConnection {
    type Stream = MemoryStream;

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    async fn open_stream(&self, id: StreamId) -> TransportResult<MemoryStream> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();

        let server_side = MemoryStream {
            id,
            tx: Some(to_client),
            rx: from_client,
            fragment_size: self.fragment_size,
        };
        self.incoming
            .send(server_side)
            .map_err(|_| TransportError::ConnectionRefused(self.remote))?;

        Ok(MemoryStream {
            id,
            tx: Some(to_server),
            rx: from_server,
            fragment_size: self.fragment_size,
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// One end of an in-process stream.
pub struct MemoryStream {
    id: StreamId,
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    rx: mpsc::UnboundedReceiver<Bytes>,
    fragment_size: usize,
}

impl Stream for MemoryStream {
    fn id(&self) -> StreamId {
        self.id
    }

    async fn read(&mut self) -> TransportResult<Option<Bytes>> {
        Ok(self.rx.recv().await)
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        for chunk in data.chunks(self.fragment_size) {
            tx.send(Bytes::copy_from_slice(chunk))
                .map_err(|_| TransportError::Closed)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.tx = None;
        Ok(())
    }
}

/// Receives streams opened against one address.
pub struct MemoryListener {
    addr: SocketAddr,
    rx: mpsc::UnboundedReceiver<MemoryStream>,
    network: Arc<NetworkInner>,
}

impl Listener for MemoryListener {
    type Stream = MemoryStream;

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn accept(&mut self) -> TransportResult<Option<MemoryStream>> {
        Ok(self.rx.recv().await)
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.network.listeners.remove(&self.addr);
    }
}
