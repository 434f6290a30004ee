use std::collections::HashMap;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand};

use qh::config::ClientConfig;
use qh::lifecycle::startup;
use qh::net::tcp::TcpDialer;
use qh::observability::logging::init_logging;
use qh::protocol::{debug_request, debug_response};
use qh::{Client, Method, Response};

#[derive(Parser)]
#[command(name = "qh-cli")]
#[command(about = "Client and wire inspector for the QH protocol", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8090")]
    addr: String,

    /// Host sent in requests (defaults to the address host)
    #[arg(long)]
    host: Option<String>,

    /// TOML config file (falls back to QH_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request without a body
    Get { path: String },
    /// Send a request with a body
    Send {
        /// POST, PUT or PATCH
        method: Method,
        path: String,
        body: String,
        /// Content-type code (0-15)
        #[arg(short = 't', long)]
        content_type: Option<u8>,
    },
    /// Annotate encoded request bytes
    InspectRequest {
        data: String,
        #[arg(long)]
        base64: bool,
    },
    /// Annotate encoded response bytes
    InspectResponse {
        data: String,
        #[arg(long)]
        base64: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::load(startup::config_path(cli.config).as_deref())?;
    init_logging(&config.observability);

    let host = match cli.host {
        Some(host) => host,
        None => cli
            .addr
            .rsplit_once(':')
            .map(|(host, _)| host.trim_matches(['[', ']']).to_string())
            .unwrap_or_else(|| cli.addr.clone()),
    };

    match cli.command {
        Commands::Get { path } => {
            let client = connect(&cli.addr, config.client).await?;
            let resp = client.get(&host, &path, HashMap::new()).await?;
            print_response(&resp);
            client.close().await;
        }
        Commands::Send {
            method,
            path,
            body,
            content_type,
        } => {
            let mut headers = HashMap::new();
            if let Some(code) = content_type {
                headers.insert("content-type".to_string(), code.to_string());
            }
            let client = connect(&cli.addr, config.client).await?;
            let resp = client.send(method, &host, &path, headers, body.into()).await?;
            print_response(&resp);
            client.close().await;
        }
        Commands::InspectRequest { data, base64 } => {
            println!("{}", debug_request(&decode_input(&data, base64)?));
        }
        Commands::InspectResponse { data, base64 } => {
            println!("{}", debug_response(&decode_input(&data, base64)?));
        }
    }

    Ok(())
}

async fn connect(addr: &str, config: ClientConfig) -> Result<Client<TcpDialer>, qh::ClientError> {
    let client = Client::new(TcpDialer, config);
    client.connect(addr).await?;
    Ok(client)
}

fn print_response(resp: &Response) {
    println!("Status: {}", resp.status);
    let mut names: Vec<_> = resp.headers.keys().collect();
    names.sort();
    for name in names {
        println!("{}: {}", name, resp.headers[name]);
    }
    println!();
    println!("{}", resp.text_body());
}

fn decode_input(data: &str, base64: bool) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if base64 {
        return Ok(BASE64.decode(data.trim())?);
    }

    let digits: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("hex input has an odd number of digits".into());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(Into::into))
        .collect()
}
