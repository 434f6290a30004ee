//! Redirect target extraction and follow-up request construction.

use url::Url;

use crate::client::{ClientError, ClientResult};
use crate::protocol::status::{PERMANENT_REDIRECT, TEMPORARY_REDIRECT};
use crate::protocol::{Method, Request, Response, VERSION};

/// Where a redirect points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub path: String,
}

/// Extract the target of a redirect response.
///
/// `host` plus `path` headers win over `location`, and are only used when
/// both are present. A relative `location` resolves against `current_host`.
pub fn redirect_target(resp: &Response, current_host: &str) -> ClientResult<RedirectTarget> {
    if let (Some(host), Some(path)) = (resp.header("host"), resp.header("path")) {
        return Ok(RedirectTarget {
            host: host.to_string(),
            path: normalize_path(path),
        });
    }

    let location = resp
        .header("location")
        .ok_or(ClientError::MissingRedirectTarget)?;
    parse_location(location, current_host)
}

fn parse_location(location: &str, current_host: &str) -> ClientResult<RedirectTarget> {
    let invalid = |e: url::ParseError| ClientError::InvalidLocation(format!("{location}: {e}"));

    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("qh://{current_host}/"))
            .and_then(|base| base.join(location))
            .map_err(invalid)?,
        Err(e) => return Err(invalid(e)),
    };

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| ClientError::InvalidLocation(format!("{location}: no host")))?;

    let mut path = normalize_path(url.path());
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    Ok(RedirectTarget { host, path })
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Returns true if a redirect with `status` keeps the method and body.
pub fn preserves_method(status: u16) -> bool {
    matches!(status, TEMPORARY_REDIRECT | PERMANENT_REDIRECT)
}

/// Build the request sent to `target` after a redirect with `status`.
///
/// 307 and 308 repeat the original method and body. Every other redirect
/// becomes a bodyless GET without `content-length`.
pub fn follow_up(original: &Request, status: u16, target: RedirectTarget) -> Request {
    let mut headers = original.headers.clone();

    let (method, body) = if preserves_method(status) {
        (original.method, original.body.clone())
    } else {
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-length"));
        (Method::Get, Default::default())
    };

    Request {
        method,
        host: target.host,
        path: target.path,
        version: VERSION,
        headers,
        body,
    }
}
