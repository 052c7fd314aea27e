//! Resolved caller identity and the built-in header-based resolver.
//!
//! [`Identity`] is what an identity resolver hands back: an optional
//! name and an ordered list of roles. The pipeline renders it as the
//! CouchDB username and roles headers, defaulting both to `""`.

use async_trait::async_trait;
use http::request::Parts;
use serde::{Deserialize, Serialize};

use super::adapter::{IdentityResolver, ResolveResult};
use crate::error::IdentityRejection;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl Identity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            roles: None,
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Build an identity from a loosely typed JSON value.
    ///
    /// `null` is no identity. A non-string `name` becomes absent and a
    /// non-array `roles` becomes absent; array entries are stringified the
    /// way a comma join would (`null` as empty, numbers and booleans as
    /// their literal text).
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        if value.is_null() {
            return None;
        }

        let name = value.get("name").and_then(Value::as_str).map(String::from);
        let roles = value.get("roles").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        });

        Some(Self { name, roles })
    }

    /// Value for the username header.
    #[must_use]
    pub fn username(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Value for the roles header: order preserved, no dedup.
    #[must_use]
    pub fn roles_header(&self) -> String {
        self.roles.as_deref().map(|r| r.join(",")).unwrap_or_default()
    }
}

const fn default_true() -> bool {
    true
}

fn default_user_header() -> String {
    "x-forwarded-user".to_string()
}

fn default_roles_header() -> String {
    "x-forwarded-groups".to_string()
}

/// Trusts identity headers set by an authenticating layer in front of
/// this proxy (an SSO gateway, an ingress auth hook).
///
/// The incoming headers are read before the trusted CouchDB headers are
/// written, so clients reaching the proxy directly can assert any user.
/// Only deploy it behind a layer that overwrites these headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardedUserResolver {
    #[serde(default = "default_user_header")]
    pub user_header: String,

    #[serde(default = "default_roles_header")]
    pub roles_header: String,

    /// Reject requests without a user header instead of passing them
    /// through anonymously.
    #[serde(default)]
    pub require_user: bool,

    #[serde(default = "default_true")]
    pub trim_roles: bool,
}

impl Default for ForwardedUserResolver {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
            roles_header: default_roles_header(),
            require_user: false,
            trim_roles: default_true(),
        }
    }
}

impl ForwardedUserResolver {
    fn header<'a>(request: &'a Parts, name: &str) -> Option<&'a str> {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    fn parse_roles(&self, raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|r| if self.trim_roles { r.trim() } else { r })
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl IdentityResolver for ForwardedUserResolver {
    async fn resolve(&self, request: &Parts) -> ResolveResult {
        let Some(user) = Self::header(request, &self.user_header) else {
            if self.require_user {
                return Err(Box::new(IdentityRejection::unauthorized(format!(
                    "missing {} header",
                    self.user_header
                ))));
            }
            return Ok(None);
        };

        let roles = Self::header(request, &self.roles_header)
            .map(|raw| self.parse_roles(raw))
            .unwrap_or_default();

        tracing::debug!(user = %user, roles = roles.len(), "identity from forwarded headers");
        Ok(Some(Identity::new(user).with_roles(roles)))
    }
}
