//! Per-stream request processing.

use std::sync::Arc;
use std::time::Instant;

use crate::compression::{compress, parse_accept_encoding, select_encoding};
use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, Stream, TransportResult};
use crate::observability::metrics::{self, Side};
use crate::protocol::status::{BAD_REQUEST, PAYLOAD_TOO_LARGE, UNSUPPORTED_MEDIA_TYPE};
use crate::protocol::{
    parse_request, ContentType, FrameError, MessageKind, Method, Request, Response, StreamBuffer,
};
use crate::server::router::{Handler, Router};

/// QH server: a routing table plus the dispatch policy around it.
pub struct Server {
    router: Router,
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            router: Router::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register a handler. Must happen before `serve`.
    pub fn handle_func(&mut self, path: impl Into<String>, method: Method, handler: impl Handler) {
        self.router.route(path, method, handler);
    }

    /// Accept streams until the listener closes or shutdown is triggered.
    ///
    /// Every stream is served by its own task.
    pub async fn serve<L: Listener>(self, mut listener: L, shutdown: &Shutdown) -> TransportResult<()> {
        let server = Arc::new(self);
        let mut shutdown_rx = shutdown.subscribe();

        tracing::info!(
            address = %listener.local_addr(),
            routes = server.router.len(),
            "Starting QH server loop"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received, stopping accept loop");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(Some(stream)) => {
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            server.serve_stream(stream).await;
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                },
            }
        }

        Ok(())
    }

    /// Serve requests on one stream until it ends or must be dropped.
    pub async fn serve_stream<S: Stream>(&self, mut stream: S) {
        let stream_id = stream.id();
        let mut buffer = StreamBuffer::new(MessageKind::Request, self.config.max_request_size);

        loop {
            let fragment = match stream.read().await {
                Ok(Some(fragment)) => fragment,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(stream_id = %stream_id, error = %e, "Stream read error");
                    break;
                }
            };
            tracing::trace!(
                stream_id = %stream_id,
                fragment_bytes = fragment.len(),
                total_bytes = buffer.len() + fragment.len(),
                "Received data fragment"
            );

            if let Err(FrameError::TooLarge { limit }) = buffer.push(&fragment) {
                tracing::error!(stream_id = %stream_id, limit, "Request size exceeds limit");
                self.reply(&mut stream, &Response::text(PAYLOAD_TOO_LARGE, "Payload Too Large"))
                    .await;
                break;
            }

            loop {
                match buffer.next_message() {
                    Ok(Some(message)) => {
                        let resp = self.handle_message(&message);
                        if !self.reply(&mut stream, &resp).await {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(stream_id = %stream_id, error = %e, "Request validation error");
                        metrics::record_parse_error(Side::Server);
                        self.reply(&mut stream, &Response::text(BAD_REQUEST, "Bad Request"))
                            .await;
                        let _ = stream.close().await;
                        return;
                    }
                }
            }
        }

        let _ = stream.close().await;
    }

    /// Turn one complete request message into a response.
    pub fn handle_message(&self, message: &[u8]) -> Response {
        let mut req = match parse_request(message) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, bytes = message.len(), "Failed to parse request");
                metrics::record_parse_error(Side::Server);
                return Response::text(BAD_REQUEST, "Bad Request");
            }
        };

        let started = Instant::now();
        let method = req.method;
        tracing::debug!(method = %method, host = %req.host, path = %req.path, "Complete request received");

        if method.allows_body() {
            if let Err(value) = validate_content_type(&mut req) {
                tracing::warn!(value = %value, "Invalid content-type");
                metrics::record_request(method, UNSUPPORTED_MEDIA_TYPE, started);
                return Response::text(UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
            }
        }

        let accept_encoding = req.headers.get("accept-encoding").cloned();
        let resp = self.router.dispatch(req);
        let resp = self.apply_compression(accept_encoding.as_deref(), resp);

        metrics::record_request(method, resp.status, started);
        resp
    }

    /// Compress `resp` if the client accepts an encoding the server supports
    /// and the result is smaller.
    pub fn apply_compression(&self, accept_encoding: Option<&str>, mut resp: Response) -> Response {
        let original = resp.body.len();
        if original == 0 {
            return resp;
        }
        if original < self.config.min_compression_size {
            tracing::debug!(
                bytes = original,
                threshold = self.config.min_compression_size,
                "Skipping compression for small response"
            );
            return resp;
        }
        if resp.headers.get("content-type").map(String::as_str) == Some("4") {
            tracing::debug!("Skipping compression for binary media");
            return resp;
        }

        let Some(accept_encoding) = accept_encoding.filter(|v| !v.is_empty()) else {
            return resp;
        };
        let client = parse_accept_encoding(accept_encoding);
        let Some(encoding) = select_encoding(&client, &self.config.supported_encodings) else {
            tracing::debug!(accept_encoding = %accept_encoding, "No common encoding between client and server");
            return resp;
        };

        let compressed = match compress(&resp.body, encoding) {
            Ok(compressed) => compressed,
            Err(e) => {
                tracing::error!(encoding = %encoding, error = %e, "Compression failed");
                return resp;
            }
        };
        if compressed.len() >= original {
            tracing::debug!(
                encoding = %encoding,
                original,
                compressed = compressed.len(),
                "Compression not beneficial"
            );
            return resp;
        }

        tracing::info!(
            encoding = %encoding,
            original_bytes = original,
            compressed_bytes = compressed.len(),
            "Compressed response"
        );
        metrics::record_compression(encoding, original, compressed.len());

        resp.headers
            .insert("content-encoding".to_string(), encoding.as_str().to_string());
        resp.headers
            .insert("content-length".to_string(), compressed.len().to_string());
        resp.body = compressed.into();
        resp
    }

    /// Write `resp`; returns false if the stream is no longer usable.
    async fn reply<S: Stream>(&self, stream: &mut S, resp: &Response) -> bool {
        match stream.write(&resp.encode()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(stream_id = %stream.id(), error = %e, "Failed to write response");
                false
            }
        }
    }
}

/// Default a missing content-type to octet-stream; reject codes outside 0-15.
///
/// Returns the offending value on rejection.
fn validate_content_type(req: &mut Request) -> Result<(), String> {
    match req.headers.get("content-type").filter(|v| !v.is_empty()) {
        None => {
            req.headers
                .insert("content-type".to_string(), ContentType::OctetStream.header_value());
            Ok(())
        }
        Some(value) => match value.parse::<u32>() {
            Ok(code) if ContentType::is_valid_code(code) => Ok(()),
            _ => Err(value.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{decompress, Encoding};
    use crate::protocol::parse_response;

    fn server() -> Server {
        let mut server = Server::new(ServerConfig::default());
        server.handle_func("/echo", Method::Post, |req: Request| {
            let content_type = req.header("content-type").unwrap_or("").to_string();
            Response::text(200, content_type)
        });
        server.handle_func("/big", Method::Get, |_req: Request| Response::text(200, "a".repeat(4096)));
        server.handle_func("/small", Method::Get, |_req: Request| Response::text(200, "a".repeat(500)));
        server.handle_func("/binary", Method::Get, |_req: Request| {
            let headers = [("content-type".to_string(), "4".to_string())].into();
            Response::new(200, vec![0u8; 4096], headers)
        });
        server
    }

    fn get(path: &str, accept_encoding: Option<&str>) -> Vec<u8> {
        let mut req = Request::new(Method::Get, "localhost", path);
        if let Some(value) = accept_encoding {
            req = req.with_header("accept-encoding", value);
        }
        req.encode()
    }

    #[test]
    fn test_content_type_defaults_to_octet_stream() {
        let req = Request::new(Method::Post, "localhost", "/echo").with_body("x");
        let resp = server().handle_message(&req.encode());
        assert_eq!(resp.status, 200);
        assert_eq!(resp.text_body(), "4");
    }

    #[test]
    fn test_content_type_validation() {
        let server = server();
        for (value, status) in [("2", 200), ("15", 200), ("0", 200), ("16", 415), ("json", 415), ("-1", 415)] {
            let req = Request::new(Method::Post, "localhost", "/echo")
                .with_header("content-type", value)
                .with_body("{}");
            let resp = server.handle_message(&req.encode());
            assert_eq!(resp.status, status, "content-type {value}");
        }
    }

    #[test]
    fn test_get_skips_content_type_check() {
        let req = Request::new(Method::Get, "localhost", "/big").with_header("content-type", "99");
        assert_eq!(server().handle_message(&req.encode()).status, 200);
    }

    #[test]
    fn test_parse_failure_is_400() {
        let resp = server().handle_message(&[0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.text_body(), "Bad Request");
    }

    #[test]
    fn test_unknown_route_is_404() {
        let resp = server().handle_message(&get("/nope", None));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_compression_applied() {
        let resp = server().handle_message(&get("/big", Some("gzip, zstd")));
        assert_eq!(resp.header("content-encoding"), Some("gzip"));
        assert_eq!(resp.header("content-length"), Some(resp.body.len().to_string().as_str()));
        let body = decompress(&resp.body, Encoding::Gzip, 1 << 20).unwrap();
        assert_eq!(body, vec![b'a'; 4096]);
    }

    #[test]
    fn test_compression_skipped() {
        let server = server();

        let resp = server.handle_message(&get("/small", Some("zstd, br, gzip")));
        assert!(resp.header("content-encoding").is_none());
        assert_eq!(resp.body.len(), 500);

        let resp = server.handle_message(&get("/binary", Some("zstd")));
        assert!(resp.header("content-encoding").is_none());

        let resp = server.handle_message(&get("/big", None));
        assert!(resp.header("content-encoding").is_none());

        let resp = server.handle_message(&get("/big", Some("identity, deflate")));
        assert!(resp.header("content-encoding").is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let server = server();
        let body = "b".repeat(1024);
        let resp = server.apply_compression(Some("br"), Response::text(200, body.clone()));
        assert_eq!(resp.header("content-encoding"), Some("br"));

        let resp = server.apply_compression(Some("br"), Response::text(200, &body[..1023]));
        assert!(resp.header("content-encoding").is_none());
    }

    #[test]
    fn test_incompressible_body_left_alone() {
        let mut server = Server::new(ServerConfig {
            min_compression_size: 1,
            ..ServerConfig::default()
        });
        server.handle_func("/tiny", Method::Get, |_req: Request| Response::text(200, "ab"));
        let resp = server.handle_message(&get("/tiny", Some("gzip")));
        assert!(resp.header("content-encoding").is_none());
        assert_eq!(resp.text_body(), "ab");
    }

    #[test]
    fn test_server_preference_limits_choice() {
        let server = Server::new(ServerConfig {
            supported_encodings: vec![Encoding::Zstd],
            ..ServerConfig::default()
        });
        let resp = server.apply_compression(Some("gzip, br"), Response::text(200, "c".repeat(2048)));
        assert!(resp.header("content-encoding").is_none());

        let resp = server.apply_compression(Some("gzip, zstd"), Response::text(200, "c".repeat(2048)));
        assert_eq!(resp.header("content-encoding"), Some("zstd"));
        let round_trip = parse_response(&resp.encode()).unwrap();
        assert_eq!(round_trip.header("content-encoding"), Some("zstd"));
    }
}
