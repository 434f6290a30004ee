//! Static header tables and the three-format header encoding.
//!
//! # Wire Formats
//! ```text
//! Format 1 (complete pair):  <id>
//! Format 2 (name only):      <id><varint valueLen><value>
//! Format 3 (custom):         <0x00><varint nameLen><name><varint valueLen><value>
//! ```
//!
//! # Design Decisions
//! - One table per direction; ids are only meaningful within their table
//! - An entry with an empty value is name-only, any other entry is a complete pair
//! - Tables are immutable and built once on first use
//! - An id missing from the table is a hard error: unlike status codes there
//!   is no way to skip an entry whose shape is unknown

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::protocol::types::WireError;
use crate::protocol::varint::{append_uvarint, read_uvarint};

/// Marker byte introducing a custom (Format 3) header.
pub const CUSTOM_HEADER: u8 = 0x00;

/// A static table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderEntry {
    pub id: u8,
    pub name: &'static str,
    /// Empty for name-only entries.
    pub value: &'static str,
}

impl HeaderEntry {
    const fn name(id: u8, name: &'static str) -> Self {
        Self { id, name, value: "" }
    }

    const fn pair(id: u8, name: &'static str, value: &'static str) -> Self {
        Self { id, name, value }
    }

    /// Returns true if this entry stands for a full name and value.
    pub fn is_complete_pair(&self) -> bool {
        !self.value.is_empty()
    }
}

static REQUEST_ENTRIES: &[HeaderEntry] = &[
    HeaderEntry::name(0x01, "accept"),
    HeaderEntry::name(0x02, "accept-encoding"),
    HeaderEntry::name(0x03, "accept-language"),
    HeaderEntry::name(0x04, "content-type"),
    HeaderEntry::name(0x05, "content-length"),
    HeaderEntry::name(0x06, "authorization"),
    HeaderEntry::name(0x07, "cookie"),
    HeaderEntry::name(0x08, "user-agent"),
    HeaderEntry::name(0x09, "referer"),
    HeaderEntry::name(0x0a, "origin"),
    HeaderEntry::name(0x0b, "if-none-match"),
    HeaderEntry::name(0x0c, "if-modified-since"),
    HeaderEntry::name(0x0d, "range"),
    HeaderEntry::name(0x0e, "host"),
    HeaderEntry::name(0x0f, "cache-control"),
    HeaderEntry::name(0x10, "connection"),
    HeaderEntry::name(0x11, "x-payment"),
    HeaderEntry::name(0x12, "sec-ch-ua"),
    HeaderEntry::name(0x13, "sec-ch-ua-mobile"),
    HeaderEntry::name(0x14, "sec-ch-ua-platform"),
    HeaderEntry::name(0x15, "sec-fetch-site"),
    HeaderEntry::name(0x16, "sec-fetch-mode"),
    HeaderEntry::name(0x17, "sec-fetch-dest"),
    HeaderEntry::name(0x18, "upgrade-insecure-requests"),
    HeaderEntry::name(0x19, "x-requested-with"),
    HeaderEntry::name(0x1a, "pragma"),
    HeaderEntry::name(0x1b, "priority"),
    HeaderEntry::name(0x1c, "dnt"),
    HeaderEntry::name(0x1d, "te"),
    HeaderEntry::name(0x1e, "x-forwarded-for"),
    HeaderEntry::name(0x1f, "x-request-id"),
    HeaderEntry::pair(0x40, "accept", "*/*"),
    HeaderEntry::pair(0x41, "accept", "application/json"),
    HeaderEntry::pair(0x42, "accept", "text/html"),
    HeaderEntry::pair(
        0x43,
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    HeaderEntry::pair(0x44, "accept-encoding", "zstd, br, gzip"),
    HeaderEntry::pair(0x45, "accept-encoding", "gzip, deflate, br"),
    HeaderEntry::pair(0x46, "accept-encoding", "gzip, deflate, br, zstd"),
    HeaderEntry::pair(0x47, "accept-encoding", "gzip"),
    HeaderEntry::pair(0x48, "accept-language", "en-US,en;q=0.9"),
    HeaderEntry::pair(0x49, "content-type", "application/json"),
    HeaderEntry::pair(0x4a, "content-type", "application/json; charset=UTF-8"),
    HeaderEntry::pair(0x4b, "content-type", "application/x-www-form-urlencoded"),
    HeaderEntry::pair(0x4c, "content-type", "text/plain; charset=UTF-8"),
    HeaderEntry::pair(0x4d, "cache-control", "no-cache"),
    HeaderEntry::pair(0x4e, "cache-control", "max-age=0"),
    HeaderEntry::pair(0x4f, "connection", "keep-alive"),
    HeaderEntry::pair(0x50, "sec-ch-ua-mobile", "?0"),
    HeaderEntry::pair(0x51, "sec-ch-ua-mobile", "?1"),
    HeaderEntry::pair(0x52, "sec-ch-ua-platform", "\"Windows\""),
    HeaderEntry::pair(0x53, "sec-ch-ua-platform", "\"macOS\""),
    HeaderEntry::pair(0x54, "sec-ch-ua-platform", "\"Linux\""),
    HeaderEntry::pair(0x55, "sec-fetch-site", "same-origin"),
    HeaderEntry::pair(0x56, "sec-fetch-site", "cross-site"),
    HeaderEntry::pair(0x57, "sec-fetch-site", "none"),
    HeaderEntry::pair(0x58, "sec-fetch-mode", "cors"),
    HeaderEntry::pair(0x59, "sec-fetch-mode", "navigate"),
    HeaderEntry::pair(0x5a, "sec-fetch-dest", "empty"),
    HeaderEntry::pair(0x5b, "sec-fetch-dest", "document"),
    HeaderEntry::pair(0x5c, "upgrade-insecure-requests", "1"),
    HeaderEntry::pair(0x5d, "x-requested-with", "XMLHttpRequest"),
    HeaderEntry::pair(0x5e, "pragma", "no-cache"),
    HeaderEntry::pair(0x5f, "priority", "u=0, i"),
    HeaderEntry::pair(0x60, "priority", "u=1, i"),
    HeaderEntry::pair(0x61, "dnt", "1"),
    HeaderEntry::pair(0x62, "te", "trailers"),
];

static RESPONSE_ENTRIES: &[HeaderEntry] = &[
    HeaderEntry::name(0x01, "content-type"),
    HeaderEntry::name(0x02, "content-length"),
    HeaderEntry::name(0x03, "cache-control"),
    HeaderEntry::name(0x04, "content-encoding"),
    HeaderEntry::name(0x05, "date"),
    HeaderEntry::name(0x06, "etag"),
    HeaderEntry::name(0x07, "expires"),
    HeaderEntry::name(0x08, "last-modified"),
    HeaderEntry::name(0x09, "access-control-allow-origin"),
    HeaderEntry::name(0x0a, "access-control-allow-methods"),
    HeaderEntry::name(0x0b, "access-control-allow-headers"),
    HeaderEntry::name(0x0c, "set-cookie"),
    HeaderEntry::name(0x0d, "location"),
    HeaderEntry::name(0x0e, "content-security-policy"),
    HeaderEntry::name(0x0f, "x-content-type-options"),
    HeaderEntry::name(0x10, "x-frame-options"),
    HeaderEntry::name(0x11, "vary"),
    HeaderEntry::name(0x12, "x-payment-response"),
    HeaderEntry::name(0x13, "server"),
    HeaderEntry::name(0x14, "strict-transport-security"),
    HeaderEntry::name(0x15, "host"),
    HeaderEntry::name(0x16, "path"),
    HeaderEntry::name(0x17, "retry-after"),
    HeaderEntry::name(0x18, "content-language"),
    HeaderEntry::name(0x19, "content-disposition"),
    HeaderEntry::name(0x1a, "age"),
    HeaderEntry::name(0x1b, "accept-ranges"),
    HeaderEntry::name(0x1c, "link"),
    HeaderEntry::name(0x1d, "referrer-policy"),
    HeaderEntry::name(0x1e, "x-xss-protection"),
    HeaderEntry::name(0x1f, "alt-svc"),
    HeaderEntry::name(0x20, "timing-allow-origin"),
    HeaderEntry::pair(0x40, "content-encoding", "gzip"),
    HeaderEntry::pair(0x41, "content-encoding", "br"),
    HeaderEntry::pair(0x42, "content-encoding", "zstd"),
    HeaderEntry::pair(0x43, "content-encoding", "deflate"),
    HeaderEntry::pair(0x44, "content-type", "application/json"),
    HeaderEntry::pair(0x45, "content-type", "application/json; charset=utf-8"),
    HeaderEntry::pair(0x46, "content-type", "text/html; charset=utf-8"),
    HeaderEntry::pair(0x47, "content-type", "text/plain; charset=utf-8"),
    HeaderEntry::pair(0x48, "cache-control", "no-cache"),
    HeaderEntry::pair(0x49, "cache-control", "no-store"),
    HeaderEntry::pair(0x4a, "cache-control", "max-age=0"),
    HeaderEntry::pair(0x4b, "cache-control", "private"),
    HeaderEntry::pair(0x4c, "cache-control", "public, max-age=31536000"),
    HeaderEntry::pair(0x4d, "x-content-type-options", "nosniff"),
    HeaderEntry::pair(0x4e, "x-frame-options", "DENY"),
    HeaderEntry::pair(0x4f, "x-frame-options", "SAMEORIGIN"),
    HeaderEntry::pair(0x50, "access-control-allow-origin", "*"),
    HeaderEntry::pair(0x51, "vary", "Accept-Encoding"),
    HeaderEntry::pair(0x52, "vary", "Origin"),
    HeaderEntry::pair(0x53, "accept-ranges", "bytes"),
    HeaderEntry::pair(
        0x54,
        "strict-transport-security",
        "max-age=31536000; includeSubDomains",
    ),
    HeaderEntry::pair(0x55, "referrer-policy", "strict-origin-when-cross-origin"),
    HeaderEntry::pair(0x56, "referrer-policy", "no-referrer"),
    HeaderEntry::pair(0x57, "x-xss-protection", "0"),
    HeaderEntry::pair(0x58, "x-xss-protection", "1; mode=block"),
    HeaderEntry::pair(0x59, "timing-allow-origin", "*"),
];

/// Lookup structure derived from one direction's static entries.
#[derive(Debug)]
pub struct HeaderTable {
    by_id: HashMap<u8, HeaderEntry>,
    name_only: HashMap<&'static str, u8>,
    complete_pairs: HashMap<&'static str, HashMap<&'static str, u8>>,
}

impl HeaderTable {
    fn build(entries: &'static [HeaderEntry]) -> Self {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut name_only = HashMap::new();
        let mut complete_pairs: HashMap<&'static str, HashMap<&'static str, u8>> = HashMap::new();

        for entry in entries {
            by_id.insert(entry.id, *entry);
            if entry.is_complete_pair() {
                complete_pairs
                    .entry(entry.name)
                    .or_default()
                    .insert(entry.value, entry.id);
            } else {
                name_only.insert(entry.name, entry.id);
            }
        }

        Self {
            by_id,
            name_only,
            complete_pairs,
        }
    }

    /// Table row for `id`, if any.
    pub fn entry(&self, id: u8) -> Option<&HeaderEntry> {
        self.by_id.get(&id)
    }

    /// Id of the complete pair `name: value`. `name` must be lowercase.
    pub fn complete_pair_id(&self, name: &str, value: &str) -> Option<u8> {
        self.complete_pairs.get(name)?.get(value).copied()
    }

    /// Id of the name-only entry for `name`. `name` must be lowercase.
    pub fn name_only_id(&self, name: &str) -> Option<u8> {
        self.name_only.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

static REQUEST_TABLE: LazyLock<HeaderTable> = LazyLock::new(|| HeaderTable::build(REQUEST_ENTRIES));
static RESPONSE_TABLE: LazyLock<HeaderTable> = LazyLock::new(|| HeaderTable::build(RESPONSE_ENTRIES));

/// Table used for request headers.
pub fn request_table() -> &'static HeaderTable {
    &REQUEST_TABLE
}

/// Table used for response headers.
pub fn response_table() -> &'static HeaderTable {
    &RESPONSE_TABLE
}

/// Encode one header, choosing the most compact format available.
pub fn encode_header(name: &str, value: &str, table: &HeaderTable, out: &mut Vec<u8>) {
    let name = name.to_lowercase();

    if let Some(id) = table.complete_pair_id(&name, value) {
        out.push(id);
        return;
    }

    if let Some(id) = table.name_only_id(&name) {
        out.push(id);
        append_field(out, value.as_bytes());
        return;
    }

    out.push(CUSTOM_HEADER);
    append_field(out, name.as_bytes());
    append_field(out, value.as_bytes());
}

/// Encode a header map into a header block (without its length prefix).
pub fn encode_headers(headers: &HashMap<String, String>, table: &HeaderTable) -> Vec<u8> {
    let mut block = Vec::new();
    for (name, value) in headers {
        encode_header(name, value, table, &mut block);
    }
    block
}

/// Decode a complete header block.
///
/// Names are lowercased; a repeated name keeps the last value.
pub fn decode_headers(block: &[u8], table: &HeaderTable) -> Result<HashMap<String, String>, WireError> {
    let mut headers = HashMap::new();
    let mut offset = 0;

    while offset < block.len() {
        let id = block[offset];
        offset += 1;

        let (name, value) = if id == CUSTOM_HEADER {
            let name = read_string(block, &mut offset, "custom header name")?;
            let value = read_string(block, &mut offset, "custom header value")?;
            (name.to_lowercase(), value)
        } else {
            let entry = table.entry(id).ok_or(WireError::UnknownHeaderId(id))?;
            if entry.is_complete_pair() {
                (entry.name.to_string(), entry.value.to_string())
            } else {
                let value = read_string(block, &mut offset, "header value")?;
                (entry.name.to_string(), value)
            }
        };

        headers.insert(name, value);
    }

    Ok(headers)
}

fn append_field(out: &mut Vec<u8>, bytes: &[u8]) {
    append_uvarint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Read a length-prefixed UTF-8 string that must lie entirely inside `block`.
fn read_string(block: &[u8], offset: &mut usize, field: &'static str) -> Result<String, WireError> {
    let (len, n) = read_uvarint(block, *offset).map_err(|e| match e {
        WireError::Incomplete => WireError::LengthExceedsBuffer { field: "headers" },
        other => other,
    })?;
    *offset += n;

    let remaining = block.len() - *offset;
    if len > remaining as u64 {
        return Err(WireError::LengthExceedsBuffer { field });
    }
    let end = *offset + len as usize;
    let value = std::str::from_utf8(&block[*offset..end])
        .map_err(|_| WireError::InvalidUtf8 { field })?
        .to_string();
    *offset = end;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(name: &str, value: &str, table: &HeaderTable) -> Vec<u8> {
        let mut out = Vec::new();
        encode_header(name, value, table, &mut out);
        out
    }

    #[test]
    fn test_tables_are_consistent() {
        for entries in [REQUEST_ENTRIES, RESPONSE_ENTRIES] {
            let mut ids = std::collections::HashSet::new();
            for entry in entries {
                assert_ne!(entry.id, CUSTOM_HEADER);
                assert!(ids.insert(entry.id), "duplicate id {:#04x}", entry.id);
                assert_eq!(entry.name, entry.name.to_lowercase());
            }
        }
        assert!(request_table().entry(0xff).is_none());
        assert!(response_table().entry(0xff).is_none());
    }

    #[test]
    fn test_complete_pair_is_one_byte() {
        let cases = [
            ("sec-ch-ua-mobile", "?0"),
            ("content-type", "application/json; charset=UTF-8"),
            ("accept", "*/*"),
            ("connection", "keep-alive"),
            ("cache-control", "no-cache"),
        ];
        for (name, value) in cases {
            let encoded = single(name, value, request_table());
            assert_eq!(encoded.len(), 1, "{name}: {value}");
            assert_eq!(Some(encoded[0]), request_table().complete_pair_id(name, value));
        }

        let encoded = single("content-encoding", "gzip", response_table());
        assert_eq!(encoded, vec![0x40]);
    }

    #[test]
    fn test_complete_pair_wins_over_name_only() {
        let encoded = single("Content-Type", "application/json", request_table());
        assert_eq!(encoded, vec![0x49]);
    }

    #[test]
    fn test_name_only_encoding() {
        let accept = request_table().name_only_id("accept").unwrap();
        assert_eq!(single("accept", "2", request_table()), vec![accept, 0x01, b'2']);

        let content_type = response_table().name_only_id("content-type").unwrap();
        assert_eq!(
            single("content-type", "2", response_table()),
            vec![content_type, 0x01, b'2']
        );

        let encoded = single("user-agent", "Mozilla/5.0", request_table());
        assert_eq!(encoded[0], 0x08);
        assert_eq!(encoded[1] as usize, "Mozilla/5.0".len());
        assert_eq!(&encoded[2..], b"Mozilla/5.0");
    }

    #[test]
    fn test_custom_encoding() {
        let encoded = single("X-Trace-Id", "trace-xyz-789", request_table());
        let mut expected = vec![CUSTOM_HEADER, 10];
        expected.extend_from_slice(b"x-trace-id");
        expected.push(13);
        expected.extend_from_slice(b"trace-xyz-789");
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_decode_all_formats() {
        let headers = HashMap::from([
            ("content-type".to_string(), "application/json; charset=UTF-8".to_string()),
            ("Accept".to_string(), "text/plain".to_string()),
            ("x-custom".to_string(), "value".to_string()),
            ("x-empty".to_string(), String::new()),
        ]);
        let block = encode_headers(&headers, request_table());
        let decoded = decode_headers(&block, request_table()).unwrap();

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded["content-type"], "application/json; charset=UTF-8");
        assert_eq!(decoded["accept"], "text/plain");
        assert_eq!(decoded["x-custom"], "value");
        assert_eq!(decoded["x-empty"], "");
    }

    #[test]
    fn test_decode_repeated_name_overwrites() {
        let mut block = Vec::new();
        encode_header("X-Dup", "first", request_table(), &mut block);
        encode_header("x-dup", "second", request_table(), &mut block);
        let decoded = decode_headers(&block, request_table()).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["x-dup"], "second");
    }

    #[test]
    fn test_decode_unknown_id() {
        assert_eq!(
            decode_headers(&[0xff], response_table()),
            Err(WireError::UnknownHeaderId(0xff))
        );
    }

    #[test]
    fn test_decode_truncated_value() {
        // Name-only id declaring 5 value bytes but carrying 2.
        let block = [0x08, 0x05, b'a', b'b'];
        assert_eq!(
            decode_headers(&block, request_table()),
            Err(WireError::LengthExceedsBuffer { field: "header value" })
        );

        // Custom header cut inside its name length varint.
        let block = [CUSTOM_HEADER, 0x80];
        assert_eq!(
            decode_headers(&block, request_table()),
            Err(WireError::LengthExceedsBuffer { field: "headers" })
        );
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let block = [0x08, 0x02, 0xc3, 0x28];
        assert_eq!(
            decode_headers(&block, request_table()),
            Err(WireError::InvalidUtf8 { field: "header value" })
        );
    }
}
