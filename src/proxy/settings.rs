//! Construction-time options and their canonical resolved form.
//!
//! [`ProxyOptions`] is the flexible, serde-friendly shape (every field
//! optional or defaulted, header names as plain strings, target as text).
//! [`ProxySettings::resolve`] turns it into the canonical form the
//! pipeline uses: parsed target URL, exactly three parsed header names,
//! empty strings normalized away. [`ProxyArgs`] accepts the resolver and
//! the options in either order.

use http::HeaderName;
use serde::{Deserialize, Serialize};
use url::Url;

use super::adapter::Resolver;
use crate::error::ProxyError;

pub const DEFAULT_TARGET: &str = "http://localhost:5984";
pub const DEFAULT_USERNAME_HEADER: &str = "X-Auth-CouchDB-UserName";
pub const DEFAULT_ROLES_HEADER: &str = "X-Auth-CouchDB-Roles";
pub const DEFAULT_TOKEN_HEADER: &str = "X-Auth-CouchDB-Token";

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

/// This crate's own name and version, the default proxy metadata.
#[must_use]
pub fn default_info() -> Option<serde_json::Value> {
    Some(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

const fn default_pool_idle() -> u64 {
    30
}

fn is_default_target(v: &str) -> bool {
    v == DEFAULT_TARGET
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyOptions {
    /// Pseudonym recorded in the `Via` header. No `Via` entry without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,

    /// Shared CouchDB proxy-auth secret; enables the token header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default = "default_target", skip_serializing_if = "is_default_target")]
    pub target: String,

    #[serde(default, skip_serializing_if = "HeaderFieldOverrides::is_default")]
    pub header_fields: HeaderFieldOverrides,

    /// Metadata merged into the root response. An explicit `null`
    /// disables injection; leaving it out uses [`default_info`].
    #[serde(default = "default_info")]
    pub info: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "TransportOptions::is_default")]
    pub transport: TransportOptions,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            via: None,
            secret: None,
            target: default_target(),
            header_fields: HeaderFieldOverrides::default(),
            info: default_info(),
            transport: TransportOptions::default(),
        }
    }
}

impl ProxyOptions {
    #[must_use]
    pub fn via(mut self, via: impl Into<String>) -> Self {
        self.via = Some(via.into());
        self
    }

    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn info(mut self, info: Option<serde_json::Value>) -> Self {
        self.info = info;
        self
    }

    #[must_use]
    pub fn header_fields(mut self, header_fields: HeaderFieldOverrides) -> Self {
        self.header_fields = header_fields;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }
}

/// Per-slot overrides for the trusted header names.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderFieldOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl HeaderFieldOverrides {
    fn is_default(&self) -> bool {
        self.username.is_none() && self.roles.is_none() && self.token.is_none()
    }
}

/// Options handed to the transport as-is.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportOptions {
    /// Upper bound on waiting for upstream response headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_pool_idle")]
    pub pool_idle_timeout_secs: u64,

    /// Rewrite `Host` to the target's authority.
    #[serde(default, skip_serializing_if = "is_false")]
    pub change_origin: bool,

    /// Add `X-Forwarded-For/-Proto/-Host/-Port`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub xfwd: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            pool_idle_timeout_secs: default_pool_idle(),
            change_origin: false,
            xfwd: false,
        }
    }
}

impl TransportOptions {
    fn is_default(&self) -> bool {
        self.timeout_ms.is_none()
            && self.pool_idle_timeout_secs == default_pool_idle()
            && !self.change_origin
            && !self.xfwd
    }
}

/// The three trusted header slots, always all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    pub username: HeaderName,
    pub roles: HeaderName,
    pub token: HeaderName,
}

impl HeaderFields {
    pub fn resolve(overrides: &HeaderFieldOverrides) -> Result<Self, ProxyError> {
        let parse = |value: Option<&String>, default: &str| {
            let raw = value.map_or(default, String::as_str);
            HeaderName::from_bytes(raw.as_bytes())
                .map_err(|_| ProxyError::InvalidHeaderName(raw.to_string()))
        };
        Ok(Self {
            username: parse(overrides.username.as_ref(), DEFAULT_USERNAME_HEADER)?,
            roles: parse(overrides.roles.as_ref(), DEFAULT_ROLES_HEADER)?,
            token: parse(overrides.token.as_ref(), DEFAULT_TOKEN_HEADER)?,
        })
    }

    #[must_use]
    pub fn names(&self) -> [&str; 3] {
        [
            self.username.as_str(),
            self.roles.as_str(),
            self.token.as_str(),
        ]
    }
}

/// Canonical configuration consumed by the pipeline and transport.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub via: Option<String>,
    pub secret: Option<String>,
    pub target: Url,
    pub header_fields: HeaderFields,
    pub info: Option<serde_json::Value>,
    pub transport: TransportOptions,
}

impl ProxySettings {
    pub fn resolve(options: &ProxyOptions) -> Result<Self, ProxyError> {
        Ok(Self {
            via: non_empty(options.via.as_deref()),
            secret: non_empty(options.secret.as_deref()),
            target: parse_target(&options.target)?,
            header_fields: HeaderFields::resolve(&options.header_fields)?,
            info: options.info.clone().filter(|v| !v.is_null()),
            transport: options.transport.clone(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(String::from)
}

/// Parse and check a backend base URL.
pub fn parse_target(raw: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(raw).map_err(|e| ProxyError::InvalidTarget {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ProxyError::InvalidTarget {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{other}' (expected http or https)"),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ProxyError::InvalidTarget {
            url: raw.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}

/// Construction arguments: a resolver plus options, in either order.
pub struct ProxyArgs {
    pub resolver: Resolver,
    pub options: ProxyOptions,
}

impl From<(Resolver, ProxyOptions)> for ProxyArgs {
    fn from((resolver, options): (Resolver, ProxyOptions)) -> Self {
        Self { resolver, options }
    }
}

impl From<(ProxyOptions, Resolver)> for ProxyArgs {
    fn from((options, resolver): (ProxyOptions, Resolver)) -> Self {
        Self { resolver, options }
    }
}

impl From<Resolver> for ProxyArgs {
    fn from(resolver: Resolver) -> Self {
        Self {
            resolver,
            options: ProxyOptions::default(),
        }
    }
}
