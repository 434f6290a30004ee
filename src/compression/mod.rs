//! Content-encoding negotiation and size-limited (de)compression.
//!
//! # Responsibilities
//! - Parse `accept-encoding` lists and pick an encoding both peers support
//! - Compress response bodies with gzip, brotli or zstd
//! - Decompress with a hard output ceiling against decompression bombs
//!
//! # Design Decisions
//! - Client order wins: the first client encoding the server supports is used
//! - Unknown tokens (including `identity`) in `accept-encoding` are ignored
//! - Output is read through a limit of `max_size + 1` bytes, so an oversized
//!   stream is detected without ever holding more than that in memory

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BROTLI_QUALITY: u32 = 4;
const BROTLI_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;
const ZSTD_LEVEL: i32 = 3;

/// A supported content encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "zstd")]
    Zstd,
    #[serde(rename = "br")]
    Brotli,
    #[serde(rename = "gzip")]
    Gzip,
}

/// Default preference order for both peers.
pub const DEFAULT_ENCODINGS: [Encoding; 3] = [Encoding::Zstd, Encoding::Brotli, Encoding::Gzip];

impl Encoding {
    /// Token used in `content-encoding` and `accept-encoding`.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Zstd => "zstd",
            Encoding::Brotli => "br",
            Encoding::Gzip => "gzip",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "zstd" => Ok(Encoding::Zstd),
            "br" => Ok(Encoding::Brotli),
            "gzip" => Ok(Encoding::Gzip),
            other => Err(CompressionError::Unsupported(other.to_string())),
        }
    }
}

/// Compression failures.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Encoding token this implementation cannot handle.
    #[error("unsupported encoding: {0}")]
    Unsupported(String),

    /// Decompressed output would pass the caller's ceiling.
    #[error("decompressed size exceeds limit of {limit} bytes")]
    SizeLimitExceeded { limit: usize },

    /// The codec itself failed (corrupt input, truncated stream).
    #[error("{encoding} codec error: {source}")]
    Io {
        encoding: Encoding,
        #[source]
        source: std::io::Error,
    },
}

pub type CompressionResult<T> = Result<T, CompressionError>;

/// Parse an `accept-encoding` value, keeping known encodings in order.
pub fn parse_accept_encoding(header: &str) -> Vec<Encoding> {
    header
        .split(',')
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Render an `accept-encoding` value.
pub fn accept_encoding_header(encodings: &[Encoding]) -> String {
    encodings
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// First client encoding that the server also supports.
pub fn select_encoding(client: &[Encoding], server: &[Encoding]) -> Option<Encoding> {
    client.iter().copied().find(|e| server.contains(e))
}

/// Compress `data`. Empty input is returned unchanged.
pub fn compress(data: &[u8], encoding: Encoding) -> CompressionResult<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let io_err = |source| CompressionError::Io { encoding, source };

    match encoding {
        Encoding::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).map_err(io_err)?;
            encoder.finish().map_err(io_err)
        }
        Encoding::Brotli => {
            let mut out = Vec::new();
            {
                let mut writer = brotli::CompressorWriter::new(
                    &mut out,
                    BROTLI_BUFFER,
                    BROTLI_QUALITY,
                    BROTLI_WINDOW,
                );
                writer.write_all(data).map_err(io_err)?;
                writer.flush().map_err(io_err)?;
            }
            Ok(out)
        }
        Encoding::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL).map_err(io_err),
    }
}

/// Decompress `data`, failing once output would exceed `max_size` bytes.
pub fn decompress(data: &[u8], encoding: Encoding, max_size: usize) -> CompressionResult<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let io_err = |source| CompressionError::Io { encoding, source };

    let reader: Box<dyn Read + '_> = match encoding {
        Encoding::Gzip => Box::new(flate2::read::GzDecoder::new(data)),
        Encoding::Brotli => Box::new(brotli::Decompressor::new(data, BROTLI_BUFFER)),
        Encoding::Zstd => Box::new(zstd::stream::read::Decoder::new(data).map_err(io_err)?),
    };

    let mut out = Vec::new();
    reader
        .take(max_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(io_err)?;

    if out.len() > max_size {
        return Err(CompressionError::SizeLimitExceeded { limit: max_size });
    }
    Ok(out)
}
