//! Request and response encoding and decoding.
//!
//! # Wire Layout
//! ```text
//! Request:  [ver:2|method:3|rsv:3] [len][host] [len][path] [len][headers] [len][body]
//! Response: [ver:2|status:6]       [len][headers] [len][body]
//! ```
//!
//! Every `len` is a varint and is checked against the remaining buffer before
//! it is used to slice. Bytes after the body are ignored.

use bytes::Bytes;

use crate::protocol::headers::{decode_headers, encode_headers, request_table, response_table};
use crate::protocol::status::{decode_status, encode_status};
use crate::protocol::types::{
    Method, Request, Response, WireError, MAX_HOST_LEN, MAX_VERSION, METHOD_MASK, METHOD_SHIFT,
    STATUS_MASK, VERSION_SHIFT,
};
use crate::protocol::varint::{append_uvarint, read_uvarint, uvarint_len};

const VERSION_MASK: u8 = 0b11;

impl Request {
    /// Encode into wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let headers = encode_headers(&self.headers, request_table());
        let mut out = Vec::with_capacity(
            1 + field_len(self.host.len())
                + field_len(self.path.len())
                + field_len(headers.len())
                + field_len(self.body.len()),
        );

        out.push(((self.version & VERSION_MASK) << VERSION_SHIFT) | (self.method.code() << METHOD_SHIFT));
        append_field(&mut out, self.host.as_bytes());
        append_field(&mut out, self.path.as_bytes());
        append_field(&mut out, &headers);
        append_field(&mut out, &self.body);
        out
    }

    /// Decode a complete request.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        parse_request(data)
    }
}

impl Response {
    /// Encode into wire bytes. Unmapped status codes are sent as 500.
    pub fn encode(&self) -> Vec<u8> {
        let headers = encode_headers(&self.headers, response_table());
        let mut out = Vec::with_capacity(1 + field_len(headers.len()) + field_len(self.body.len()));

        out.push(((self.version & VERSION_MASK) << VERSION_SHIFT) | encode_status(self.status));
        append_field(&mut out, &headers);
        append_field(&mut out, &self.body);
        out
    }

    /// Decode a complete response.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        parse_response(data)
    }
}

/// Decode a request from a buffer holding at least one full message.
pub fn parse_request(data: &[u8]) -> Result<Request, WireError> {
    let first = *data.first().ok_or(WireError::EmptyMessage)?;

    let version = first >> VERSION_SHIFT;
    if version > MAX_VERSION {
        return Err(WireError::InvalidVersion(version));
    }
    let method_code = (first >> METHOD_SHIFT) & METHOD_MASK;
    let method = Method::from_code(method_code).ok_or(WireError::InvalidMethod(method_code))?;

    let mut reader = FieldReader::new(data, 1);

    let host = reader.string("host")?;
    if host.is_empty() {
        return Err(WireError::EmptyHost);
    }
    if host.len() > MAX_HOST_LEN {
        return Err(WireError::HostTooLong {
            len: host.len(),
            max: MAX_HOST_LEN,
        });
    }

    let mut path = reader.string("path")?;
    if path.is_empty() {
        path.push('/');
    }

    let headers = decode_headers(reader.field("headers")?, request_table())?;
    let body = Bytes::copy_from_slice(reader.field("body")?);

    Ok(Request {
        method,
        host,
        path,
        version,
        headers,
        body,
    })
}

/// Decode a response from a buffer holding at least one full message.
pub fn parse_response(data: &[u8]) -> Result<Response, WireError> {
    let first = *data.first().ok_or(WireError::EmptyMessage)?;

    let version = first >> VERSION_SHIFT;
    if version > MAX_VERSION {
        return Err(WireError::InvalidVersion(version));
    }
    let status = decode_status(first & STATUS_MASK);

    let mut reader = FieldReader::new(data, 1);
    let headers = decode_headers(reader.field("headers")?, response_table())?;
    let body = Bytes::copy_from_slice(reader.field("body")?);

    Ok(Response {
        version,
        status,
        headers,
        body,
    })
}

fn append_field(out: &mut Vec<u8>, bytes: &[u8]) {
    append_uvarint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn field_len(len: usize) -> usize {
    uvarint_len(len as u64) + len
}

/// Sequential reader over length-prefixed fields.
struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    /// Next field's bytes, borrowed from the input.
    fn field(&mut self, name: &'static str) -> Result<&'a [u8], WireError> {
        let (len, n) = read_uvarint(self.data, self.offset)?;
        self.offset += n;

        let remaining = self.data.len() - self.offset;
        if len > remaining as u64 {
            return Err(WireError::LengthExceedsBuffer { field: name });
        }

        let start = self.offset;
        self.offset += len as usize;
        Ok(&self.data[start..self.offset])
    }

    fn string(&mut self, name: &'static str) -> Result<String, WireError> {
        let bytes = self.field(name)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8 { field: name })
    }
}
