//! Compact status codes.
//!
//! # Responsibilities
//! - Map standard status codes to the 6-bit compact form in the first
//!   response byte, and back
//! - Coerce unmapped codes to 500 in both directions
//!
//! # Design Decisions
//! - The table is ordered by real-world frequency; the compact value is the
//!   index into `COMPACT_STATUS`
//! - Decoding is total: compact 0 is 200 and an unknown compact value is 500,
//!   so there is no failure value that could be confused with a valid code

pub const CONTINUE: u16 = 100;
pub const SWITCHING_PROTOCOLS: u16 = 101;
pub const PROCESSING: u16 = 102;
pub const EARLY_HINTS: u16 = 103;

pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const ACCEPTED: u16 = 202;
pub const NO_CONTENT: u16 = 204;
pub const RESET_CONTENT: u16 = 205;
pub const PARTIAL_CONTENT: u16 = 206;
pub const MULTI_STATUS: u16 = 207;
pub const ALREADY_REPORTED: u16 = 208;
pub const IM_USED: u16 = 226;

pub const MULTIPLE_CHOICES: u16 = 300;
pub const MOVED_PERMANENTLY: u16 = 301;
pub const FOUND: u16 = 302;
pub const SEE_OTHER: u16 = 303;
pub const NOT_MODIFIED: u16 = 304;
pub const USE_PROXY: u16 = 305;
pub const TEMPORARY_REDIRECT: u16 = 307;
pub const PERMANENT_REDIRECT: u16 = 308;

pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const PAYMENT_REQUIRED: u16 = 402;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const METHOD_NOT_ALLOWED: u16 = 405;
pub const NOT_ACCEPTABLE: u16 = 406;
pub const PROXY_AUTH_REQUIRED: u16 = 407;
pub const REQUEST_TIMEOUT: u16 = 408;
pub const CONFLICT: u16 = 409;
pub const GONE: u16 = 410;
pub const LENGTH_REQUIRED: u16 = 411;
pub const PRECONDITION_FAILED: u16 = 412;
pub const PAYLOAD_TOO_LARGE: u16 = 413;
pub const URI_TOO_LONG: u16 = 414;
pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;
pub const RANGE_NOT_SATISFIABLE: u16 = 416;
pub const EXPECTATION_FAILED: u16 = 417;
pub const UNPROCESSABLE_ENTITY: u16 = 422;
pub const TOO_MANY_REQUESTS: u16 = 429;

pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const BAD_GATEWAY: u16 = 502;
pub const SERVICE_UNAVAILABLE: u16 = 503;
pub const GATEWAY_TIMEOUT: u16 = 504;
pub const VERSION_NOT_SUPPORTED: u16 = 505;

/// Status codes indexed by compact value. Room for 64 entries.
static COMPACT_STATUS: [u16; 46] = [
    OK,
    NOT_FOUND,
    INTERNAL_SERVER_ERROR,
    FOUND,
    BAD_REQUEST,
    FORBIDDEN,
    UNAUTHORIZED,
    MOVED_PERMANENTLY,
    NOT_MODIFIED,
    SERVICE_UNAVAILABLE,
    CREATED,
    ACCEPTED,
    NO_CONTENT,
    PARTIAL_CONTENT,
    TEMPORARY_REDIRECT,
    PERMANENT_REDIRECT,
    CONFLICT,
    GONE,
    PRECONDITION_FAILED,
    PAYLOAD_TOO_LARGE,
    URI_TOO_LONG,
    UNSUPPORTED_MEDIA_TYPE,
    UNPROCESSABLE_ENTITY,
    TOO_MANY_REQUESTS,
    BAD_GATEWAY,
    GATEWAY_TIMEOUT,
    VERSION_NOT_SUPPORTED,
    CONTINUE,
    SWITCHING_PROTOCOLS,
    PROCESSING,
    EARLY_HINTS,
    RESET_CONTENT,
    MULTI_STATUS,
    ALREADY_REPORTED,
    IM_USED,
    MULTIPLE_CHOICES,
    SEE_OTHER,
    USE_PROXY,
    PAYMENT_REQUIRED,
    METHOD_NOT_ALLOWED,
    NOT_ACCEPTABLE,
    PROXY_AUTH_REQUIRED,
    REQUEST_TIMEOUT,
    LENGTH_REQUIRED,
    RANGE_NOT_SATISFIABLE,
    EXPECTATION_FAILED,
];

/// Compact value written for any unmapped status.
pub const FALLBACK_COMPACT: u8 = 2;

/// Convert a status code to its compact 6-bit form.
pub fn encode_status(code: u16) -> u8 {
    COMPACT_STATUS
        .iter()
        .position(|&c| c == code)
        .map(|index| index as u8)
        .unwrap_or(FALLBACK_COMPACT)
}

/// Convert a compact value back to a status code.
pub fn decode_status(compact: u8) -> u16 {
    COMPACT_STATUS
        .get(compact as usize)
        .copied()
        .unwrap_or(INTERNAL_SERVER_ERROR)
}

/// Returns true if `code` survives the compact encoding unchanged.
pub fn is_mapped(code: u16) -> bool {
    COMPACT_STATUS.contains(&code)
}

/// Reason phrase for logs and default bodies.
pub fn reason(code: u16) -> &'static str {
    match code {
        OK => "OK",
        CREATED => "Created",
        ACCEPTED => "Accepted",
        NO_CONTENT => "No Content",
        MOVED_PERMANENTLY => "Moved Permanently",
        FOUND => "Found",
        NOT_MODIFIED => "Not Modified",
        TEMPORARY_REDIRECT => "Temporary Redirect",
        PERMANENT_REDIRECT => "Permanent Redirect",
        BAD_REQUEST => "Bad Request",
        UNAUTHORIZED => "Unauthorized",
        FORBIDDEN => "Forbidden",
        NOT_FOUND => "Not Found",
        METHOD_NOT_ALLOWED => "Method Not Allowed",
        PAYLOAD_TOO_LARGE => "Payload Too Large",
        UNSUPPORTED_MEDIA_TYPE => "Unsupported Media Type",
        TOO_MANY_REQUESTS => "Too Many Requests",
        INTERNAL_SERVER_ERROR => "Internal Server Error",
        BAD_GATEWAY => "Bad Gateway",
        SERVICE_UNAVAILABLE => "Service Unavailable",
        GATEWAY_TIMEOUT => "Gateway Timeout",
        VERSION_NOT_SUPPORTED => "QH Version Not Supported",
        _ => "Unknown",
    }
}
