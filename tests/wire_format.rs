//! Wire format behaviour seen through the public protocol API.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use qh::protocol::framing::{request_len, response_len};
use qh::protocol::headers::{encode_headers, request_table};
use qh::protocol::{
    debug_request, is_request_complete, is_response_complete, parse_request, parse_response,
    FrameError, MessageKind, Method, Request, Response, StreamBuffer, WireError,
};

fn full_request() -> Request {
    Request::new(Method::Post, "api.example.com", "/v1/items?limit=5")
        .with_header("content-type", "2")
        .with_header("accept-encoding", "zstd, br, gzip")
        .with_header("user-agent", "qh-test/1.0")
        .with_header("x-trace", "abc123")
        .with_body(r#"{"name":"widget","count":3}"#)
}

#[test]
fn test_get_on_the_wire() {
    let encoded = Request::new(Method::Get, "example.com", "/").encode();
    assert_eq!(encoded[0], 0x00);
    assert_eq!(encoded[1] as usize, "example.com".len());
    assert_eq!(&encoded[encoded.len() - 2..], &[0x00, 0x00]);
    assert_eq!(is_request_complete(&encoded), Ok(true));
    assert_eq!(request_len(&encoded), Ok(Some(encoded.len())));
}

#[test]
fn test_complete_pair_is_single_byte() {
    let headers = HashMap::from([("accept".to_string(), "*/*".to_string())]);
    assert_eq!(encode_headers(&headers, request_table()), vec![0x40]);
}

#[test]
fn test_every_prefix_is_incomplete() {
    let encoded = full_request().encode();
    for end in 0..encoded.len() {
        assert_eq!(is_request_complete(&encoded[..end]), Ok(false), "prefix {end}");
    }
    assert_eq!(is_request_complete(&encoded), Ok(true));

    let resp = Response::text(200, "done").encode();
    for end in 0..resp.len() {
        assert_eq!(is_response_complete(&resp[..end]), Ok(false), "prefix {end}");
    }
    assert_eq!(is_response_complete(&resp), Ok(true));
}

#[test]
fn test_unknown_header_id_rejected() {
    // Response: status 200, header block of one byte holding id 0xFF, empty body.
    let data = [0x00, 0x01, 0xff, 0x00];
    assert_eq!(parse_response(&data), Err(WireError::UnknownHeaderId(0xff)));
}

#[test]
fn test_oversized_length_rejected() {
    // Host "h", then a path claiming far more bytes than follow.
    let mut data = vec![0x00, 0x01, b'h'];
    data.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
    data.extend_from_slice(b"short");
    assert_eq!(
        parse_request(&data),
        Err(WireError::LengthExceedsBuffer { field: "path" })
    );
    assert_eq!(is_request_complete(&data), Ok(false));

    // An impossible host length is rejected before it arrives.
    let data = [0x00, 0xff, 0x01];
    assert!(matches!(
        is_request_complete(&data),
        Err(WireError::HostTooLong { .. })
    ));
}

#[test]
fn test_randomly_fragmented_delivery() {
    let mut rng = StdRng::seed_from_u64(0x5148);
    let req = full_request();
    let encoded = req.encode();

    for _ in 0..200 {
        let mut buffer = StreamBuffer::new(MessageKind::Request, 1 << 16);
        let mut offset = 0;
        let mut message = None;

        while offset < encoded.len() {
            let size = rng.gen_range(1..=8).min(encoded.len() - offset);
            buffer.push(&encoded[offset..offset + size]).unwrap();
            offset += size;

            if let Some(complete) = buffer.next_message().unwrap() {
                assert_eq!(offset, encoded.len(), "completed early");
                message = Some(complete);
            }
        }

        let message = message.expect("message completed");
        assert_eq!(parse_request(&message).unwrap(), req);
        assert!(buffer.is_empty());
    }
}

#[test]
fn test_random_bytes_never_panic() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..2000 {
        let len = rng.gen_range(0..64);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();

        let _ = parse_request(&data);
        let _ = parse_response(&data);
        let _ = request_len(&data);
        let _ = response_len(&data);
        let _ = debug_request(&data);

        if let Ok(Some(len)) = request_len(&data) {
            assert!(len <= data.len());
        }
    }
}

#[test]
fn test_buffer_limit_applies_across_fragments() {
    let encoded = full_request().encode();
    let mut buffer = StreamBuffer::new(MessageKind::Request, encoded.len() - 1);
    let (head, tail) = encoded.split_at(encoded.len() / 2);
    buffer.push(head).unwrap();
    assert_eq!(
        buffer.push(tail),
        Err(FrameError::TooLarge {
            limit: encoded.len() - 1
        })
    );
    assert!(buffer.is_empty());
}

#[test]
fn test_debug_dump_names_fields() {
    let dump = debug_request(&full_request().encode());
    assert!(dump.contains("api.example.com"));
    assert!(dump.contains("Body"));
}
