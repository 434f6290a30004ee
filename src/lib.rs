//! QH: a compact binary request/response protocol over an encrypted
//! stream transport.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                                              Server
//!   ┌──────────────────────┐                     ┌──────────────────────────┐
//!   │ client::Client       │                     │ server::Server           │
//!   │  redirects, decode   │                     │  routing, content-type,  │
//!   │  size limits         │                     │  compression             │
//!   └─────────┬────────────┘                     └────────────▲─────────────┘
//!             │ protocol::codec (encode)                      │ protocol::codec (parse)
//!             │                                               │ protocol::framing (complete?)
//!   ┌─────────▼────────────┐     fragments       ┌────────────┴─────────────┐
//!   │ net::Dialer          │ ──────────────────▶ │ net::Listener            │
//!   │  + net::dns key      │ ◀────────────────── │  one stream per request  │
//!   └──────────────────────┘                     └──────────────────────────┘
//!
//!   Cross-cutting: config, observability (tracing + metrics), lifecycle
//! ```

// Wire format
pub mod protocol;
pub mod compression;

// Endpoints
pub mod client;
pub mod net;
pub mod server;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use client::{Client, ClientError};
pub use config::QhConfig;
pub use lifecycle::Shutdown;
pub use protocol::{Method, Request, Response};
pub use server::Server;
