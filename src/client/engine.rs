//! Connection management and the request state machine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;

use crate::client::redirect::{follow_up, redirect_target};
use crate::client::{ClientError, ClientResult};
use crate::compression::{accept_encoding_header, decompress, Encoding};
use crate::config::ClientConfig;
use crate::net::dns::{discover_key, Resolver, SystemResolver};
use crate::net::{Connection, Dialer, Stream, StreamId};
use crate::observability::metrics::{self, Side};
use crate::protocol::{parse_response, FrameError, MessageKind, Method, Request, Response, StreamBuffer};

/// QH client over any transport.
///
/// Requests may be issued concurrently from many tasks; each gets its own
/// stream on the shared connection.
pub struct Client<D: Dialer, R: Resolver = SystemResolver> {
    dialer: D,
    resolver: R,
    config: ClientConfig,
    conn: ArcSwapOption<D::Connection>,
    /// Remote address of the live connection, kept for reconnects.
    remote: ArcSwapOption<SocketAddr>,
    next_stream_id: AtomicU32,
}

impl<D: Dialer> Client<D, SystemResolver> {
    /// Client resolving names through the operating system.
    pub fn new(dialer: D, config: ClientConfig) -> Self {
        Self::with_resolver(dialer, SystemResolver, config)
    }
}

impl<D: Dialer, R: Resolver> Client<D, R> {
    pub fn with_resolver(dialer: D, resolver: R, config: ClientConfig) -> Self {
        Self {
            dialer,
            resolver,
            config,
            conn: ArcSwapOption::empty(),
            remote: ArcSwapOption::empty(),
            next_stream_id: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns true while a connection is held.
    pub fn is_connected(&self) -> bool {
        self.conn.load().is_some()
    }

    /// Connect to `addr` (`host:port`).
    ///
    /// The address lookup and the out-of-band key lookup run concurrently.
    /// A usable key enables 0-RTT dialing; otherwise the transport performs
    /// an in-band handshake.
    pub async fn connect(&self, addr: &str) -> ClientResult<()> {
        let (host, port) = split_host_port(addr)?;

        let (ip, key) = tokio::join!(
            self.resolver.lookup_ip(host),
            discover_key(&self.resolver, host)
        );
        let remote = SocketAddr::new(ip?, port);

        if key.is_some() {
            tracing::info!(address = %remote, "Attempting connection with out-of-band key (0-RTT)");
        } else {
            tracing::info!(address = %remote, "No DNS key found, using in-band key exchange");
        }

        let conn = self.dialer.dial(remote, key).await?;
        if let Some(old) = self.conn.swap(Some(Arc::new(conn))) {
            old.close().await;
        }
        self.remote.store(Some(Arc::new(remote)));

        tracing::info!(addr = %addr, resolved = %remote, "Connected to QH server");
        Ok(())
    }

    /// Drop the connection. Further requests fail with `NotConnected`.
    pub async fn close(&self) {
        if let Some(conn) = self.conn.swap(None) {
            conn.close().await;
        }
    }

    /// Send `req`, following redirects and decoding the body.
    pub async fn request(&self, mut req: Request) -> ClientResult<Response> {
        if req.header("accept-encoding").is_none() {
            req.headers.insert(
                "accept-encoding".to_string(),
                accept_encoding_header(&self.config.supported_encodings),
            );
        }

        let mut redirects = 0;
        loop {
            let resp = self.round_trip(&req).await?;
            if !resp.is_redirect() {
                return self.decode_body(resp);
            }

            if redirects >= self.config.max_redirects {
                return Err(ClientError::TooManyRedirects {
                    max: self.config.max_redirects,
                });
            }

            let target = redirect_target(&resp, &req.host)?;
            tracing::info!(
                status = resp.status,
                host = %target.host,
                path = %target.path,
                "Following redirect"
            );
            metrics::record_redirect(resp.status);

            if target.host != req.host {
                self.reconnect(&target.host).await?;
            }

            req = follow_up(&req, resp.status, target);
            redirects += 1;
        }
    }

    pub async fn get(&self, host: &str, path: &str, headers: HashMap<String, String>) -> ClientResult<Response> {
        self.send(Method::Get, host, path, headers, Bytes::new()).await
    }

    pub async fn post(
        &self,
        host: &str,
        path: &str,
        body: impl Into<Bytes>,
        headers: HashMap<String, String>,
    ) -> ClientResult<Response> {
        self.send(Method::Post, host, path, headers, body.into()).await
    }

    pub async fn put(
        &self,
        host: &str,
        path: &str,
        body: impl Into<Bytes>,
        headers: HashMap<String, String>,
    ) -> ClientResult<Response> {
        self.send(Method::Put, host, path, headers, body.into()).await
    }

    pub async fn patch(
        &self,
        host: &str,
        path: &str,
        body: impl Into<Bytes>,
        headers: HashMap<String, String>,
    ) -> ClientResult<Response> {
        self.send(Method::Patch, host, path, headers, body.into()).await
    }

    pub async fn delete(&self, host: &str, path: &str, headers: HashMap<String, String>) -> ClientResult<Response> {
        self.send(Method::Delete, host, path, headers, Bytes::new()).await
    }

    pub async fn head(&self, host: &str, path: &str, headers: HashMap<String, String>) -> ClientResult<Response> {
        self.send(Method::Head, host, path, headers, Bytes::new()).await
    }

    /// Build a request with body rules applied: POST, PUT and PATCH get a
    /// `content-length` if absent, every other method loses its body and
    /// any `content-length`.
    pub async fn send(
        &self,
        method: Method,
        host: &str,
        path: &str,
        mut headers: HashMap<String, String>,
        mut body: Bytes,
    ) -> ClientResult<Response> {
        if method.allows_body() {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-length")) {
                headers.insert("content-length".to_string(), body.len().to_string());
            }
        } else {
            body = Bytes::new();
            headers.retain(|k, _| !k.eq_ignore_ascii_case("content-length"));
        }

        let mut req = Request::new(method, host, path).with_body(body);
        req.headers = headers;
        self.request(req).await
    }

    /// One request on a fresh stream, without redirect handling.
    async fn round_trip(&self, req: &Request) -> ClientResult<Response> {
        let conn = self.conn.load_full().ok_or(ClientError::NotConnected)?;

        let stream_id = StreamId(self.next_stream_id.fetch_add(1, Ordering::Relaxed));
        let mut stream = conn.open_stream(stream_id).await?;

        let encoded = req.encode();
        tracing::debug!(stream_id = %stream_id, bytes = encoded.len(), "Sending request");
        stream.write(&encoded).await?;

        let result = self.read_response(&mut stream).await;
        if let Err(e) = stream.close().await {
            tracing::debug!(stream_id = %stream_id, error = %e, "Stream close failed");
        }
        result
    }

    async fn read_response<S: Stream>(&self, stream: &mut S) -> ClientResult<Response> {
        let mut buffer = StreamBuffer::new(MessageKind::Response, self.config.max_response_size);

        while let Some(fragment) = stream.read().await? {
            tracing::trace!(stream_id = %stream.id(), bytes = fragment.len(), "Received fragment");

            let complete = buffer.push(&fragment).and_then(|()| buffer.next_message());
            match complete {
                Ok(Some(message)) => {
                    return parse_response(&message).map_err(|e| {
                        metrics::record_parse_error(Side::Client);
                        ClientError::Wire(e)
                    });
                }
                Ok(None) => {}
                Err(FrameError::TooLarge { limit }) => {
                    tracing::error!(stream_id = %stream.id(), limit, "Response size limit exceeded");
                    return Err(ClientError::ResponseTooLarge { limit });
                }
                Err(FrameError::Malformed(e)) => {
                    metrics::record_parse_error(Side::Client);
                    return Err(ClientError::Wire(e));
                }
            }
        }

        Err(ClientError::NoResponse)
    }

    /// Undo `content-encoding`, bounded by `max_response_size`.
    fn decode_body(&self, mut resp: Response) -> ClientResult<Response> {
        let Some(value) = resp.headers.get("content-encoding").filter(|v| !v.is_empty()) else {
            return Ok(resp);
        };
        let encoding: Encoding = value.parse()?;

        let compressed = resp.body.len();
        let body = decompress(&resp.body, encoding, self.config.max_response_size)?;

        resp.headers.remove("content-encoding");
        resp.headers
            .insert("content-length".to_string(), body.len().to_string());
        resp.body = Bytes::from(body);

        tracing::info!(
            encoding = %encoding,
            compressed_bytes = compressed,
            decompressed_bytes = resp.body.len(),
            "Response decompressed"
        );
        Ok(resp)
    }

    /// Reconnect to `host` on the port of the current connection.
    async fn reconnect(&self, host: &str) -> ClientResult<()> {
        let port = self
            .remote
            .load()
            .as_ref()
            .map(|addr| addr.port())
            .ok_or(ClientError::NotConnected)?;

        tracing::info!(host = %host, port, "Reconnecting to new host");
        self.close().await;

        let addr = if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        self.connect(&addr).await
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
fn split_host_port(addr: &str) -> ClientResult<(&str, u16)> {
    let invalid = || ClientError::InvalidAddress(addr.to_string());

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || host.contains(['[', ']']) {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host, port))
}
