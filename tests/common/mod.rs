//! Shared fixtures for integration tests: servers and clients wired over
//! the in-process transport.

#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};

use qh::config::{ClientConfig, ServerConfig};
use qh::net::dns::StaticResolver;
use qh::net::memory::MemoryNetwork;
use qh::net::{Connection, Dialer, Stream, StreamId};
use qh::protocol::{parse_response, Response};
use qh::{Client, Server, Shutdown};

pub const PORT: u16 = 8090;

pub type TestClient = Client<MemoryNetwork, StaticResolver>;

/// Address of test host number `n`.
pub fn addr(n: u8) -> SocketAddr {
    SocketAddr::new(ip(n), PORT)
}

pub fn ip(n: u8) -> IpAddr {
    IpAddr::from([10, 0, 0, n])
}

/// Start `server` on `addr`. Triggering the returned handle stops it.
pub fn spawn_server(network: &MemoryNetwork, addr: SocketAddr, server: Server) -> Shutdown {
    let listener = network.listen(addr).expect("address free");
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.serve(listener, &handle).await;
    });
    shutdown
}

pub fn server() -> Server {
    Server::new(ServerConfig::default())
}

/// Client that resolves `a.test` to host 1, unconnected.
pub fn client(network: &MemoryNetwork, config: ClientConfig) -> TestClient {
    client_with(network, StaticResolver::new().with_host("a.test", ip(1)), config)
}

pub fn client_with(network: &MemoryNetwork, resolver: StaticResolver, config: ClientConfig) -> TestClient {
    Client::with_resolver(network.clone(), resolver, config)
}

/// Client connected to `a.test`.
pub async fn connected_client(network: &MemoryNetwork, config: ClientConfig) -> TestClient {
    let client = client(network, config);
    client
        .connect(&format!("a.test:{PORT}"))
        .await
        .expect("connect");
    client
}

/// Write raw bytes on a fresh stream and collect every reply until the
/// server closes it.
pub async fn raw_exchange(network: &MemoryNetwork, addr: SocketAddr, data: &[u8]) -> Vec<u8> {
    let conn = network.dial(addr, None).await.expect("dial");
    let mut stream = conn.open_stream(StreamId(1000)).await.expect("stream");
    stream.write(data).await.expect("write");
    stream.close().await.expect("close");

    let mut received = Vec::new();
    while let Some(fragment) = stream.read().await.expect("read") {
        received.extend_from_slice(&fragment);
    }
    received
}

/// Decode a single response from raw bytes.
pub fn response(data: &[u8]) -> Response {
    parse_response(data).expect("valid response")
}
