//! Completeness detection for messages arriving in fragments.
//!
//! # Data Flow
//! ```text
//! fragment ──► StreamBuffer::push ──► next_message ──► Ok(None): wait
//!                                        │
//!                                        ├── Ok(Some(msg)): hand msg to parse
//!                                        └── Err: reject the stream
//! ```
//!
//! # Design Decisions
//! - The oracle walks the same fields as the parser but never allocates
//! - A field that is merely not here yet is `Ok(false)`; a field that can
//!   never become valid (overflowing varint, method 7, bad host length) is an
//!   error so the peer is rejected without waiting for more bytes

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::types::{WireError, MAX_HOST_LEN, METHOD_MASK, METHOD_SHIFT};
use crate::protocol::varint::read_uvarint;

/// Outcome of checking one length-prefixed field.
enum Field {
    Present,
    NeedMore,
}

/// Walks fields without decoding them.
struct Walker<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Walker<'a> {
    fn new(data: &'a [u8]) -> Self {
        // First byte carries version and method or status only.
        Self { data, offset: 1 }
    }

    fn skip_field(&mut self) -> Result<Field, WireError> {
        let (len, n) = match read_uvarint(self.data, self.offset) {
            Ok(v) => v,
            Err(WireError::Incomplete) => return Ok(Field::NeedMore),
            Err(e) => return Err(e),
        };

        let remaining = self.data.len() - self.offset - n;
        if len > remaining as u64 {
            return Ok(Field::NeedMore);
        }

        self.offset += n + len as usize;
        Ok(Field::Present)
    }

    /// Skip `count` fields; returns the end offset if all are present.
    fn skip_fields(&mut self, count: usize) -> Result<Option<usize>, WireError> {
        for _ in 0..count {
            if let Field::NeedMore = self.skip_field()? {
                return Ok(None);
            }
        }
        Ok(Some(self.offset))
    }

    /// Declared length of the next field without consuming it.
    fn peek_len(&self) -> Result<Option<u64>, WireError> {
        match read_uvarint(self.data, self.offset) {
            Ok((len, _)) => Ok(Some(len)),
            Err(WireError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Returns true once `data` holds a whole request. Trailing bytes are allowed.
pub fn is_request_complete(data: &[u8]) -> Result<bool, WireError> {
    request_len(data).map(|len| len.is_some())
}

/// Returns true once `data` holds a whole response. Trailing bytes are allowed.
pub fn is_response_complete(data: &[u8]) -> Result<bool, WireError> {
    response_len(data).map(|len| len.is_some())
}

/// Encoded length of the request at the start of `data`, once all of it is present.
pub fn request_len(data: &[u8]) -> Result<Option<usize>, WireError> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };

    let method = (first >> METHOD_SHIFT) & METHOD_MASK;
    if method > 6 {
        return Err(WireError::InvalidMethod(method));
    }

    let mut walker = Walker::new(data);

    match walker.peek_len()? {
        Some(0) => return Err(WireError::EmptyHost),
        Some(len) if len > MAX_HOST_LEN as u64 => {
            return Err(WireError::HostTooLong {
                len: usize::try_from(len).unwrap_or(usize::MAX),
                max: MAX_HOST_LEN,
            });
        }
        _ => {}
    }

    walker.skip_fields(4)
}

/// Encoded length of the response at the start of `data`, once all of it is present.
pub fn response_len(data: &[u8]) -> Result<Option<usize>, WireError> {
    if data.is_empty() {
        return Ok(None);
    }
    Walker::new(data).skip_fields(2)
}

/// Which message kind a [`StreamBuffer`] is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// Errors from accumulating a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The buffered bytes passed the configured ceiling.
    #[error("message size exceeds limit of {limit} bytes")]
    TooLarge { limit: usize },

    /// The buffered bytes can never form a valid message.
    #[error("malformed message: {0}")]
    Malformed(#[from] WireError),
}

/// Per-stream accumulator that splits complete messages off its front.
///
/// Owned by a single stream task. Bytes past the end of a message stay
/// buffered, so a stream can carry messages back to back.
#[derive(Debug)]
pub struct StreamBuffer {
    kind: MessageKind,
    buf: BytesMut,
    max_size: usize,
}

impl StreamBuffer {
    pub fn new(kind: MessageKind, max_size: usize) -> Self {
        Self {
            kind,
            buf: BytesMut::new(),
            max_size,
        }
    }

    /// Append a fragment. The buffer is discarded if it would pass `max_size`.
    pub fn push(&mut self, fragment: &[u8]) -> Result<(), FrameError> {
        if self.buf.len() + fragment.len() > self.max_size {
            self.buf.clear();
            return Err(FrameError::TooLarge {
                limit: self.max_size,
            });
        }
        self.buf.extend_from_slice(fragment);
        Ok(())
    }

    /// Split off the next complete message, if the buffer holds one.
    ///
    /// On error the buffer is discarded.
    pub fn next_message(&mut self) -> Result<Option<Bytes>, FrameError> {
        let len = match self.kind {
            MessageKind::Request => request_len(&self.buf),
            MessageKind::Response => response_len(&self.buf),
        };

        match len {
            Ok(Some(len)) => Ok(Some(self.buf.split_to(len).freeze())),
            Ok(None) => Ok(None),
            Err(e) => {
                self.buf.clear();
                Err(e.into())
            }
        }
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{Method, Request, Response};
    use crate::protocol::varint::append_uvarint;

    fn sample_request() -> Vec<u8> {
        Request::new(Method::Post, "example.com", "/submit")
            .with_header("content-type", "2")
            .with_body(r#"{"k":1}"#)
            .encode()
    }

    #[test]
    fn test_request_prefixes_incomplete() {
        let msg = sample_request();
        for k in 0..msg.len() {
            assert_eq!(is_request_complete(&msg[..k]), Ok(false), "prefix {k}");
        }
        assert_eq!(is_request_complete(&msg), Ok(true));

        let mut trailing = msg.clone();
        trailing.extend_from_slice(b"extra");
        assert_eq!(is_request_complete(&trailing), Ok(true));
    }

    #[test]
    fn test_response_prefixes_incomplete() {
        let msg = Response::text(200, "hello world").encode();
        for k in 0..msg.len() {
            assert_eq!(is_response_complete(&msg[..k]), Ok(false), "prefix {k}");
        }
        assert_eq!(is_response_complete(&msg), Ok(true));
    }

    #[test]
    fn test_oracle_rejects_impossible_input() {
        let mut overflow = vec![0x00];
        overflow.extend_from_slice(&[0xff; 10]);
        assert_eq!(is_request_complete(&overflow), Err(WireError::VarintOverflow));
        assert_eq!(is_response_complete(&overflow), Err(WireError::VarintOverflow));

        assert_eq!(is_request_complete(&[7 << 3]), Err(WireError::InvalidMethod(7)));
        assert_eq!(is_request_complete(&[0x00, 0x00]), Err(WireError::EmptyHost));

        let mut long_host = vec![0x00];
        append_uvarint(&mut long_host, 254);
        assert!(matches!(
            is_request_complete(&long_host),
            Err(WireError::HostTooLong { len: 254, .. })
        ));
    }

    #[test]
    fn test_huge_declared_length_waits() {
        // A large body length is indistinguishable from a slow peer here;
        // the size ceiling is what bounds it.
        let mut data = vec![0x00, 0x00];
        append_uvarint(&mut data, 1 << 40);
        assert_eq!(is_response_complete(&data), Ok(false));
    }

    #[test]
    fn test_message_len_excludes_trailing() {
        let msg = sample_request();
        let mut data = msg.clone();
        data.extend_from_slice(&[0x00, 0x01]);
        assert_eq!(request_len(&data), Ok(Some(msg.len())));

        let resp = Response::text(200, "ok").encode();
        assert_eq!(response_len(&resp), Ok(Some(resp.len())));
    }

    #[test]
    fn test_stream_buffer_reassembles() {
        let msg = sample_request();
        let mut buffer = StreamBuffer::new(MessageKind::Request, 1024);

        let mut out = None;
        for chunk in msg.chunks(3) {
            buffer.push(chunk).unwrap();
            if let Some(complete) = buffer.next_message().unwrap() {
                out = Some(complete);
            }
        }
        assert_eq!(out.as_deref(), Some(msg.as_slice()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stream_buffer_back_to_back() {
        let first = Request::new(Method::Get, "a.io", "/1").encode();
        let second = Request::new(Method::Get, "a.io", "/2").encode();
        let mut buffer = StreamBuffer::new(MessageKind::Request, 1024);

        let mut joined = first.clone();
        joined.extend_from_slice(&second[..4]);
        buffer.push(&joined).unwrap();
        let got = buffer.next_message().unwrap().unwrap();
        assert_eq!(&got[..], &first[..]);
        assert_eq!(buffer.next_message(), Ok(None));

        buffer.push(&second[4..]).unwrap();
        let got = buffer.next_message().unwrap().unwrap();
        assert_eq!(&got[..], &second[..]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stream_buffer_limit() {
        let mut buffer = StreamBuffer::new(MessageKind::Response, 8);
        buffer.push(&[0x00, 0x00]).unwrap();
        assert_eq!(buffer.next_message(), Ok(None));
        let err = buffer.push(&[0u8; 16]).unwrap_err();
        assert_eq!(err, FrameError::TooLarge { limit: 8 });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stream_buffer_malformed() {
        let mut buffer = StreamBuffer::new(MessageKind::Request, 64);
        buffer.push(&[7 << 3, 0x01]).unwrap();
        let err = buffer.next_message().unwrap_err();
        assert_eq!(err, FrameError::Malformed(WireError::InvalidMethod(7)));
        assert!(buffer.is_empty());
    }
}
