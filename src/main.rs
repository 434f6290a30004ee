//! QH demo server.
//!
//! Serves a handful of routes over the TCP development transport:
//!
//! ```text
//! GET    /hello             plain text greeting
//! POST   /echo              echoes the body
//! GET    /status            liveness text
//! GET    /api/user          JSON document
//! PUT    /api/user          JSON acknowledgement
//! PATCH  /api/user          JSON acknowledgement
//! DELETE /api/user          204, no body
//! POST   /data              ~2 KB text reply (compressible)
//! POST   /large-post        reports the received size
//! GET    /redirect          301 to /permanent-hello via host + path headers
//! GET    /permanent-hello   redirect target
//! GET    /binary            octet-stream, never compressed
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use qh::lifecycle::{signals, startup};
use qh::net::tcp::TcpTransportListener;
use qh::protocol::status;
use qh::protocol::ContentType;
use qh::{Method, Request, Response, Server, Shutdown};

#[derive(Parser)]
#[command(name = "qh-server")]
#[command(about = "QH protocol demo server", long_about = None)]
struct Args {
    /// TOML config file (falls back to QH_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = startup::config_path(args.config);
    let mut config = startup::init(config_path.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    tracing::info!("QH Protocol Server starting");

    let addr: SocketAddr = config.server.bind_address.parse()?;
    let mut server = Server::new(config.server.clone());
    register_routes(&mut server);

    let listener = TcpTransportListener::bind(addr).await?;
    tracing::info!(address = %addr, "QH Server started");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    server.serve(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_routes(server: &mut Server) {
    server.handle_func("/hello", Method::Get, |_req: Request| {
        Response::text(status::OK, "Hello from QH Protocol!")
    });

    server.handle_func("/echo", Method::Post, |req: Request| {
        tracing::info!(path = "/echo", bytes = req.body.len(), "Handling request");
        Response::text(status::OK, format!("Echo: {}", String::from_utf8_lossy(&req.body)))
    });

    server.handle_func("/status", Method::Get, |_req: Request| {
        Response::text(status::OK, "QH Server is running!")
    });

    server.handle_func("/api/user", Method::Get, |_req: Request| {
        let body = serde_json::json!({ "name": "John Doe", "id": 123, "active": true });
        let headers = HashMap::from([
            ("content-type".to_string(), ContentType::Json.header_value()),
            ("cache-control".to_string(), "max-age=3600".to_string()),
            ("date".to_string(), unix_now().to_string()),
        ]);
        Response::new(status::OK, body.to_string(), headers)
    });

    server.handle_func("/api/user", Method::Put, |_req: Request| {
        let body = serde_json::json!({ "message": "User updated", "id": 123 });
        Response::json(status::OK, body.to_string())
    });

    server.handle_func("/api/user", Method::Patch, |_req: Request| {
        let body = serde_json::json!({ "message": "User partially updated", "id": 123 });
        Response::json(status::OK, body.to_string())
    });

    server.handle_func("/api/user", Method::Delete, |_req: Request| {
        Response::new(status::NO_CONTENT, Vec::new(), HashMap::new())
    });

    server.handle_func("/data", Method::Post, |req: Request| {
        let body = format!(
            "Updated data: {} ; {}; Hallo Welt;",
            String::from_utf8_lossy(&req.body),
            "a".repeat(1900)
        );
        Response::text(status::OK, body)
    });

    server.handle_func("/large-post", Method::Post, |req: Request| {
        tracing::info!(path = "/large-post", body_size = req.body.len(), "Handling large POST request");
        Response::text(status::OK, format!("Received {} bytes successfully", req.body.len()))
    });

    server.handle_func("/redirect", Method::Get, |req: Request| {
        let headers = HashMap::from([
            ("host".to_string(), req.host),
            ("path".to_string(), "/permanent-hello".to_string()),
        ]);
        Response::new(status::MOVED_PERMANENTLY, Vec::new(), headers)
    });

    server.handle_func("/permanent-hello", Method::Get, |_req: Request| {
        Response::text(status::OK, "Hello from the new, permanent location!")
    });

    server.handle_func("/binary", Method::Get, |_req: Request| {
        let body: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let headers = HashMap::from([(
            "content-type".to_string(),
            ContentType::OctetStream.header_value(),
        )]);
        Response::new(status::OK, body, headers)
    });
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
