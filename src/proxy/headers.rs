//! Trusted-header sanitizing and injection, `Via` chaining, and the
//! hop-by-hop / `X-Forwarded-*` handling used when forwarding upstream.
//!
//! [`clean_headers`] strips any client-supplied copies of the trusted
//! CouchDB headers, [`inject_identity`] writes fresh ones, and
//! [`append_via`] records this proxy on the way back.

use std::sync::LazyLock;

use http::{header, HeaderMap, HeaderName, HeaderValue, Version};

use super::identity::Identity;
use super::settings::HeaderFields;
use super::sign::sign;
use crate::error::ProxyError;

/// Product token written into `Via` comments.
pub const PRODUCT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Remove every listed header under its given casing and its lowercased form.
pub fn clean_headers(headers: &mut HeaderMap, names: &[&str]) {
    for name in names {
        headers.remove(*name);
        headers.remove(name.to_ascii_lowercase().as_str());
    }
}

/// Sanitize the three trusted slots, then write the identity into them.
///
/// The token header is only written when `secret` is set.
pub fn inject_identity(
    headers: &mut HeaderMap,
    fields: &HeaderFields,
    identity: &Identity,
    secret: Option<&str>,
) -> Result<(), ProxyError> {
    clean_headers(headers, &fields.names());

    let name = identity.username();
    headers.insert(fields.username.clone(), header_value(&fields.username, name)?);
    headers.insert(
        fields.roles.clone(),
        header_value(&fields.roles, &identity.roles_header())?,
    );
    if let Some(secret) = secret {
        headers.insert(fields.token.clone(), header_value(&fields.token, &sign(name, secret))?);
    }
    Ok(())
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue, ProxyError> {
    HeaderValue::from_str(value).map_err(|_| ProxyError::InvalidHeaderValue {
        name: name.to_string(),
    })
}

/// HTTP version as it appears in a `Via` entry.
#[must_use]
pub fn via_protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Append `{version} {via} ({PRODUCT})` to the existing `Via` chain.
///
/// Every prior `Via` line is kept, in order, and folded into one
/// comma-joined value.
pub fn append_via(headers: &mut HeaderMap, version: Version, via: &str) {
    let entry = format!("{} {via} ({PRODUCT})", via_protocol(version));

    let mut chained: Vec<u8> = Vec::new();
    for prior in headers.get_all(header::VIA) {
        let prior = prior.as_bytes().trim_ascii();
        if prior.is_empty() {
            continue;
        }
        chained.extend_from_slice(prior);
        chained.extend_from_slice(b", ");
    }
    chained.extend_from_slice(entry.as_bytes());

    match HeaderValue::from_bytes(&chained) {
        Ok(val) => {
            headers.insert(header::VIA, val);
        }
        Err(_) => {
            tracing::warn!(via = %via, "invalid Via value, leaving header untouched");
        }
    }
}

/// Strip hop-by-hop headers from a message about to cross the proxy.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// Append the client to `X-Forwarded-For` and set `X-Forwarded-Proto` /
/// `X-Forwarded-Host` / `X-Forwarded-Port` from the inbound request.
pub fn add_forwarded(headers: &mut HeaderMap, client_ip: &str, proto: &str) {
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    if let Ok(val) = HeaderValue::from_str(proto) {
        headers.insert("x-forwarded-proto", val);
    }

    if let Some(host) = headers.get(header::HOST).cloned() {
        if let Some(port) = host
            .to_str()
            .ok()
            .and_then(|h| h.rsplit_once(':'))
            .map(|(_, port)| port.to_string())
            .filter(|p| p.chars().all(|c| c.is_ascii_digit()))
        {
            if let Ok(val) = HeaderValue::from_str(&port) {
                headers.insert("x-forwarded-port", val);
            }
        }
        headers.insert("x-forwarded-host", host);
    }
}
