//! Message types, wire constants and wire-level errors.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::status;

/// Protocol version written by this implementation.
pub const VERSION: u8 = 0;

/// Largest version representable in the 2-bit version field.
pub const MAX_VERSION: u8 = 3;

/// Longest accepted host (DNS name limit).
pub const MAX_HOST_LEN: usize = 253;

pub(crate) const VERSION_SHIFT: u8 = 6;
pub(crate) const METHOD_SHIFT: u8 = 3;
pub(crate) const METHOD_MASK: u8 = 0b0000_0111;
pub(crate) const STATUS_MASK: u8 = 0b0011_1111;

/// Errors produced while decoding wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The buffer ends inside a field. Not fatal: retry with more bytes.
    #[error("incomplete data")]
    Incomplete,

    /// A varint runs past the maximum length of a u64.
    #[error("varint overflows u64")]
    VarintOverflow,

    /// A declared length is larger than the bytes that follow it.
    #[error("{field} length exceeds buffer")]
    LengthExceedsBuffer { field: &'static str },

    /// Nothing to decode.
    #[error("empty message")]
    EmptyMessage,

    #[error("invalid version: {0}")]
    InvalidVersion(u8),

    /// Method bits outside 0-6.
    #[error("invalid method value: {0}")]
    InvalidMethod(u8),

    #[error("empty host")]
    EmptyHost,

    #[error("host exceeds maximum length of {max} bytes (got {len})")]
    HostTooLong { len: usize, max: usize },

    /// Header ID present in neither the static table nor the custom marker.
    #[error("unknown header ID {0:#04X} - protocol version mismatch or corrupted message")]
    UnknownHeaderId(u8),

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

impl WireError {
    /// Returns true if this error only means more data is needed.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, WireError::Incomplete)
    }
}

/// Request method, carried in 3 bits of the first byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
    Options = 6,
}

impl Method {
    /// Wire code of this method.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a 3-bit method code. Code 7 has no method.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Method::Get),
            1 => Some(Method::Post),
            2 => Some(Method::Put),
            3 => Some(Method::Patch),
            4 => Some(Method::Delete),
            5 => Some(Method::Head),
            6 => Some(Method::Options),
            _ => None,
        }
    }

    /// Methods that carry a request body.
    pub fn allows_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unknown method: {other}")),
        }
    }
}

/// Numeric content-type codes carried in the `content-type` header.
///
/// The code space is 4 bits wide; only the first five codes are named.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Custom = 0,
    TextPlain = 1,
    Json = 2,
    Html = 3,
    OctetStream = 4,
}

/// Highest valid content-type code.
pub const MAX_CONTENT_TYPE: u8 = 15;

impl ContentType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Value to place in a `content-type` header.
    pub fn header_value(self) -> String {
        self.code().to_string()
    }

    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Custom => "custom",
            ContentType::TextPlain => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Html => "text/html",
            ContentType::OctetStream => "application/octet-stream",
        }
    }

    /// Returns true if `code` lies in the content-type code space.
    pub fn is_valid_code(code: u32) -> bool {
        code <= MAX_CONTENT_TYPE as u32
    }
}

/// Build an `accept` header value listing content-type codes in preference order.
pub fn accept_header(types: &[ContentType]) -> String {
    types
        .iter()
        .map(|t| t.code().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// A decoded or to-be-encoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub host: String,
    pub path: String,
    pub version: u8,
    /// Header names are lowercase after decoding.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            version: VERSION,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }
}

/// A decoded or to-be-encoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: u8,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Response {
    /// Response with `content-length` set from the body; `headers` override it.
    pub fn new(status: u16, body: impl Into<Bytes>, headers: HashMap<String, String>) -> Self {
        let body = body.into();
        let mut all = HashMap::with_capacity(headers.len() + 1);
        all.insert("content-length".to_string(), body.len().to_string());
        all.extend(headers);
        Self {
            version: VERSION,
            status,
            headers: all,
            body,
        }
    }

    /// Plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, body.into(), ContentType::TextPlain)
    }

    /// JSON response; `body` must already be serialized.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, body.into(), ContentType::Json)
    }

    fn with_content_type(status: u16, body: String, content_type: ContentType) -> Self {
        let headers = HashMap::from([("content-type".to_string(), content_type.header_value())]);
        Self::new(status, body, headers)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }

    /// 300, 301, 302, 307 and 308 are followed by the client.
    pub fn is_redirect(&self) -> bool {
        matches!(
            self.status,
            status::MULTIPLE_CHOICES
                | status::MOVED_PERMANENTLY
                | status::FOUND
                | status::TEMPORARY_REDIRECT
                | status::PERMANENT_REDIRECT
        )
    }

    /// Body as UTF-8 text, lossily.
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn lookup_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    if let Some(value) = headers.get(name) {
        return Some(value.as_str());
    }
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
