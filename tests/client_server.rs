//! End-to-end client/server behaviour over the in-process transport.

use std::collections::HashMap;
use std::sync::Arc;

use qh::compression::CompressionError;
use qh::config::{ClientConfig, ServerConfig};
use qh::net::dns::{key_record, key_record_name, StaticResolver};
use qh::net::memory::MemoryNetwork;
use qh::net::{PeerKey, KEY_LEN, PROTOCOL_VERSION};
use qh::protocol::status;
use qh::{ClientError, Method, Request, Response, Server};

mod common;

use common::{addr, ip, PORT};

fn redirect(status: u16, location: &str) -> Response {
    let headers = HashMap::from([("location".to_string(), location.to_string())]);
    Response::new(status, Vec::new(), headers)
}

fn demo_server() -> Server {
    let mut server = common::server();
    server.handle_func("/hello", Method::Get, |_req: Request| {
        Response::text(status::OK, "Hello from QH Protocol!")
    });
    server.handle_func("/echo", Method::Post, |req: Request| {
        let body = String::from_utf8_lossy(&req.body).into_owned();
        Response::text(status::OK, format!("{} {}", req.method, body))
    });
    server.handle_func("/landing", Method::Get, |req: Request| {
        Response::text(status::OK, format!("{} {}", req.method, req.body.len()))
    });
    server.handle_func("/form", Method::Post, |_req: Request| redirect(status::FOUND, "/landing"));
    server.handle_func("/move", Method::Post, |_req: Request| {
        redirect(status::TEMPORARY_REDIRECT, "/echo")
    });
    server.handle_func("/loop", Method::Get, |_req: Request| redirect(status::FOUND, "/loop"));
    server.handle_func("/size/500", Method::Get, |_req: Request| {
        Response::text(status::OK, "x".repeat(500))
    });
    server.handle_func("/size/2000", Method::Get, |_req: Request| {
        Response::text(status::OK, "x".repeat(2000))
    });
    server.handle_func("/bomb", Method::Get, |_req: Request| {
        Response::text(status::OK, "a".repeat(100_000))
    });
    server.handle_func("/binary", Method::Get, |_req: Request| {
        let body: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
        let headers = HashMap::from([("content-type".to_string(), "4".to_string())]);
        Response::new(status::OK, body, headers)
    });
    server
}

async fn setup(config: ClientConfig) -> (MemoryNetwork, common::TestClient) {
    let network = MemoryNetwork::new();
    common::spawn_server(&network, addr(1), demo_server());
    let client = common::connected_client(&network, config).await;
    (network, client)
}

#[tokio::test]
async fn test_simple_get() {
    let (_network, client) = setup(ClientConfig::default()).await;
    let resp = client.get("a.test", "/hello", HashMap::new()).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text_body(), "Hello from QH Protocol!");
    assert_eq!(resp.header("content-type"), Some("1"));
}

#[tokio::test]
async fn test_request_without_connection() {
    let network = MemoryNetwork::new();
    let client = common::client(&network, ClientConfig::default());
    let err = client.get("a.test", "/hello", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

#[tokio::test]
async fn test_unknown_route_404() {
    let (_network, client) = setup(ClientConfig::default()).await;
    let resp = client.get("a.test", "/missing", HashMap::new()).await.unwrap();
    assert_eq!(resp.status, 404);

    // Routes match on method too.
    let resp = client
        .put("a.test", "/hello", "x", HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 404);
}

#[tokio::test]
async fn test_found_downgrades_to_get() {
    let (_network, client) = setup(ClientConfig::default()).await;
    let resp = client
        .post("a.test", "/form", "name=value", HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text_body(), "GET 0");
}

#[tokio::test]
async fn test_temporary_redirect_preserves_method_and_body() {
    let (_network, client) = setup(ClientConfig::default()).await;
    let resp = client
        .post("a.test", "/move", "payload", HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text_body(), "POST payload");
}

#[tokio::test]
async fn test_redirect_limit() {
    let config = ClientConfig {
        max_redirects: 3,
        ..ClientConfig::default()
    };
    let (_network, client) = setup(config).await;
    let err = client.get("a.test", "/loop", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::TooManyRedirects { max: 3 }));
    assert!(err.is_policy());
}

#[tokio::test]
async fn test_small_response_not_compressed() {
    let (_network, client) = setup(ClientConfig::default()).await;
    let resp = client.get("a.test", "/size/500", HashMap::new()).await.unwrap();
    assert_eq!(resp.body.len(), 500);
    assert!(resp.header("content-encoding").is_none());
}

#[tokio::test]
async fn test_large_response_round_trips_compressed() {
    let (_network, client) = setup(ClientConfig::default()).await;
    let resp = client.get("a.test", "/size/2000", HashMap::new()).await.unwrap();
    assert_eq!(resp.text_body(), "x".repeat(2000));
    assert!(resp.header("content-encoding").is_none());
    assert_eq!(resp.header("content-length"), Some("2000"));
}

#[tokio::test]
async fn test_each_encoding_end_to_end() {
    let (_network, client) = setup(ClientConfig::default()).await;
    for encoding in ["zstd", "br", "gzip"] {
        let headers = HashMap::from([("accept-encoding".to_string(), encoding.to_string())]);
        let resp = client.get("a.test", "/size/2000", headers).await.unwrap();
        assert_eq!(resp.body.len(), 2000, "{encoding}");
    }
}

#[tokio::test]
async fn test_response_size_limit() {
    let config = ClientConfig {
        max_response_size: 1000,
        ..ClientConfig::default()
    };
    let (_network, client) = setup(config).await;
    let err = client.get("a.test", "/binary", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::ResponseTooLarge { limit: 1000 }));
}

#[tokio::test]
async fn test_decompressed_size_limit() {
    let config = ClientConfig {
        max_response_size: 2000,
        ..ClientConfig::default()
    };
    let (_network, client) = setup(config).await;
    let err = client.get("a.test", "/bomb", HashMap::new()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Decompress(CompressionError::SizeLimitExceeded { limit: 2000 })
    ));
    assert!(err.is_policy());
}

#[tokio::test]
async fn test_content_type_rules() {
    let (_network, client) = setup(ClientConfig::default()).await;

    let headers = HashMap::from([("content-type".to_string(), "16".to_string())]);
    let resp = client.post("a.test", "/echo", "x", headers).await.unwrap();
    assert_eq!(resp.status, 415);
    assert_eq!(resp.text_body(), "Unsupported Media Type");

    let headers = HashMap::from([("content-type".to_string(), "2".to_string())]);
    let resp = client.post("a.test", "/echo", "{}", headers).await.unwrap();
    assert_eq!(resp.status, 200);

    let resp = client.post("a.test", "/echo", "raw", HashMap::new()).await.unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn test_concurrent_requests_share_connection() {
    let (network, client) = setup(ClientConfig::default()).await;
    let client = Arc::new(client);

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let body = format!("request-{i}");
                let resp = client
                    .post("a.test", "/echo", body.clone(), HashMap::new())
                    .await
                    .unwrap();
                assert_eq!(resp.text_body(), format!("POST {body}"));
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(network.dial_keys(addr(1)).len(), 1);
}

#[tokio::test]
async fn test_oversized_request_413() {
    let network = MemoryNetwork::new();
    let mut server = Server::new(ServerConfig {
        max_request_size: 1024,
        ..ServerConfig::default()
    });
    server.handle_func("/upload", Method::Post, |_req: Request| Response::text(status::OK, "ok"));
    common::spawn_server(&network, addr(1), server);
    let client = common::connected_client(&network, ClientConfig::default()).await;

    let resp = client
        .post("a.test", "/upload", vec![b'z'; 4096], HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 413);
    assert_eq!(resp.text_body(), "Payload Too Large");

    let resp = client
        .post("a.test", "/upload", "small", HashMap::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn test_malformed_request_400() {
    let network = MemoryNetwork::new();
    common::spawn_server(&network, addr(1), demo_server());

    // GET with an empty host can never become valid.
    let raw = common::raw_exchange(&network, addr(1), &[0x00, 0x00, 0x00]).await;
    let resp = common::response(&raw);
    assert_eq!(resp.status, 400);
    assert_eq!(resp.text_body(), "Bad Request");
}

#[tokio::test]
async fn test_back_to_back_requests_on_one_stream() {
    let network = MemoryNetwork::with_fragment_size(7);
    common::spawn_server(&network, addr(1), demo_server());

    let mut data = Request::new(Method::Get, "a.test", "/hello").encode();
    data.extend(Request::new(Method::Get, "a.test", "/missing").encode());
    let raw = common::raw_exchange(&network, addr(1), &data).await;

    let first_len = qh::protocol::framing::response_len(&raw).unwrap().unwrap();
    let first = common::response(&raw[..first_len]);
    let second = common::response(&raw[first_len..]);
    assert_eq!(first.status, 200);
    assert_eq!(second.status, 404);
}

#[tokio::test]
async fn test_cross_host_redirect_reconnects_with_key() {
    let network = MemoryNetwork::new();
    let key = PeerKey([0x5a; KEY_LEN]);

    let mut origin = common::server();
    origin.handle_func("/go", Method::Get, |_req: Request| {
        let headers = HashMap::from([
            ("host".to_string(), "b.test".to_string()),
            ("path".to_string(), "/welcome".to_string()),
        ]);
        Response::new(status::MOVED_PERMANENTLY, Vec::new(), headers)
    });
    let mut target = common::server();
    target.handle_func("/welcome", Method::Get, |req: Request| {
        Response::text(status::OK, format!("welcome to {}", req.host))
    });
    common::spawn_server(&network, addr(1), origin);
    common::spawn_server(&network, addr(2), target);

    let resolver = StaticResolver::new()
        .with_host("a.test", ip(1))
        .with_host("b.test", ip(2))
        .with_txt(key_record_name("b.test"), key_record(PROTOCOL_VERSION, &key));
    let client = common::client_with(&network, resolver, ClientConfig::default());
    client.connect(&format!("a.test:{PORT}")).await.unwrap();

    let resp = client.get("a.test", "/go", HashMap::new()).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text_body(), "welcome to b.test");

    assert_eq!(network.dial_keys(addr(1)), vec![None]);
    assert_eq!(network.dial_keys(addr(2)), vec![Some(key)]);
}

#[tokio::test]
async fn test_invalid_key_record_falls_back() {
    let network = MemoryNetwork::new();
    common::spawn_server(&network, addr(1), demo_server());

    let resolver = StaticResolver::new()
        .with_host("a.test", ip(1))
        .with_txt(key_record_name("a.test"), "v=9;k=AAAA");
    let client = common::client_with(&network, resolver, ClientConfig::default());
    client.connect(&format!("a.test:{PORT}")).await.unwrap();

    let resp = client.get("a.test", "/hello", HashMap::new()).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(network.dial_keys(addr(1)), vec![None]);
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let network = MemoryNetwork::new();
    let shutdown = common::spawn_server(&network, addr(1), demo_server());
    let client = common::connected_client(&network, ClientConfig::default()).await;
    assert_eq!(
        client.get("a.test", "/hello", HashMap::new()).await.unwrap().status,
        200
    );

    shutdown.trigger();
    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while client.get("a.test", "/hello", HashMap::new()).await.is_ok() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("server stops answering after shutdown");
}
