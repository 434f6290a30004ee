//! Host resolution and out-of-band key discovery.
//!
//! # Key Record Format
//! ```text
//! _qotp.<host>  TXT  "v=<version>;k=<base64 key>"
//! ```
//!
//! # Design Decisions
//! - Key discovery never fails a connection: any problem is logged and the
//!   client falls back to the in-band handshake
//! - Records longer than 80 characters are ignored outright

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

use crate::net::transport::{PeerKey, KEY_LEN, PROTOCOL_VERSION, TRANSPORT_NAME};

/// Longest TXT record considered a key record.
pub const MAX_KEY_RECORD_LEN: usize = 80;

/// Errors from resolving a host.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no addresses found for host: {0}")]
    NoAddresses(String),

    #[error("failed to resolve hostname {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a TXT record was not accepted as a key record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyRecordError {
    #[error("record exceeds 80 characters")]
    TooLong,

    #[error("record has no version")]
    MissingVersion,

    #[error("record version {found} does not match expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("record has no key")]
    MissingKey,

    #[error("key is not valid base64")]
    InvalidBase64,

    #[error("key is {0} bytes, expected 32")]
    WrongKeyLength(usize),
}

/// Name lookups needed by the client.
pub trait Resolver: Send + Sync + 'static {
    fn lookup_ip(&self, host: &str) -> impl Future<Output = Result<IpAddr, ResolveError>> + Send;

    /// TXT records at `name`. An absent record is an empty list, not an error.
    fn lookup_txt(&self, name: &str) -> impl Future<Output = Result<Vec<String>, ResolveError>> + Send;
}

/// Resolver backed by the operating system.
///
/// The OS interface exposes no TXT lookups, so key discovery always falls
/// back to the in-band handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    async fn lookup_ip(&self, host: &str) -> Result<IpAddr, ResolveError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|source| ResolveError::Lookup {
                host: host.to_string(),
                source,
            })?;
        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| ResolveError::NoAddresses(host.to_string()))
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        tracing::trace!(name = %name, "System resolver has no TXT support");
        Ok(Vec::new())
    }
}

/// Resolver answering from fixed tables.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, IpAddr>,
    txt: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.hosts.insert(host.into(), ip);
        self
    }

    pub fn with_txt(mut self, name: impl Into<String>, record: impl Into<String>) -> Self {
        self.txt.entry(name.into()).or_default().push(record.into());
        self
    }
}

impl Resolver for StaticResolver {
    async fn lookup_ip(&self, host: &str) -> Result<IpAddr, ResolveError> {
        if let Some(ip) = self.hosts.get(host) {
            return Ok(*ip);
        }
        host.parse::<IpAddr>()
            .map_err(|_| ResolveError::NoAddresses(host.to_string()))
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        Ok(self.txt.get(name).cloned().unwrap_or_default())
    }
}

/// Name of the TXT record holding `host`'s key.
pub fn key_record_name(host: &str) -> String {
    format!("_{TRANSPORT_NAME}.{host}")
}

/// Render the TXT record a server publishes for `key`.
pub fn key_record(version: u32, key: &PeerKey) -> String {
    format!("v={version};k={}", BASE64.encode(key.as_bytes()))
}

/// Parse a `v=<int>;k=<base64>` record.
pub fn parse_key_record(record: &str, expected_version: u32) -> Result<PeerKey, KeyRecordError> {
    if record.len() > MAX_KEY_RECORD_LEN {
        return Err(KeyRecordError::TooLong);
    }

    let mut version = None;
    let mut key = None;
    for part in record.split(';') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        match name {
            "v" => version = value.parse::<u32>().ok(),
            "k" => key = Some(value),
            _ => {}
        }
    }

    let version = version.ok_or(KeyRecordError::MissingVersion)?;
    if version != expected_version {
        return Err(KeyRecordError::VersionMismatch {
            found: version,
            expected: expected_version,
        });
    }

    let encoded = key.filter(|k| !k.is_empty()).ok_or(KeyRecordError::MissingKey)?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| KeyRecordError::InvalidBase64)?;
    let bytes: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| KeyRecordError::WrongKeyLength(b.len()))?;
    Ok(PeerKey(bytes))
}

/// Look up `host`'s out-of-band key. Every failure yields `None`.
pub async fn discover_key<R: Resolver>(resolver: &R, host: &str) -> Option<PeerKey> {
    let name = key_record_name(host);
    let records = match resolver.lookup_txt(&name).await {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!(name = %name, error = %e, "Key record lookup failed");
            return None;
        }
    };

    let record = records.first()?;
    match parse_key_record(record, PROTOCOL_VERSION) {
        Ok(key) => {
            tracing::info!(host = %host, "Found out-of-band key in DNS TXT record");
            Some(key)
        }
        Err(e) => {
            tracing::warn!(
                record = %record,
                expected_version = PROTOCOL_VERSION,
                error = %e,
                "DNS TXT record found but is invalid, falling back to in-band handshake"
            );
            None
        }
    }
}
