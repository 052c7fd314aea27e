//! Unified error types for the proxy.
//!
//! Defines [`ProxyError`] (the main crate error enum),
//! [`ValidationError`] for config validation failures, and
//! [`IdentityRejection`], which identity resolvers return to refuse a
//! request with a specific status. Error messages include contextual
//! hints to guide the user toward a fix.

use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Boxed error used at the seams where callers supply their own code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub section: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}.{}: {}", self.section, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

/// A deliberate refusal from an identity resolver.
///
/// Returning this from a resolver short-circuits the request with the
/// given status instead of the generic 500.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct IdentityRejection {
    pub status: StatusCode,
    pub reason: String,
}

impl IdentityRejection {
    #[must_use]
    pub fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, reason)
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid target URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("Invalid value for header '{name}'")]
    InvalidHeaderValue { name: String },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Identity resolution failed: {source}")]
    Identity {
        #[source]
        source: BoxError,
    },

    #[error("Identity completion was dropped without a result")]
    CompletionDropped,

    #[error("Upstream request failed: {source}")]
    Upstream {
        #[source]
        source: BoxError,
    },

    #[error("Upstream request timed out after {}ms", .0.as_millis())]
    UpstreamTimeout(Duration),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Status code this error renders with when it ends a request.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Identity { source } => source
                .downcast_ref::<IdentityRejection>()
                .map_or(StatusCode::INTERNAL_SERVER_ERROR, |r| r.status),
            Self::InvalidHeaderValue { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// CouchDB-style error body: `{"error": "...", "reason": "..."}`.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match status {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => "proxy_error",
            _ => "internal_server_error",
        };
        let reason = match &self {
            Self::Identity { source } => source.to_string(),
            other => other.to_string(),
        };
        (
            status,
            Json(serde_json::json!({ "error": error, "reason": reason })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_keeps_its_status() {
        let err = ProxyError::Identity {
            source: Box::new(IdentityRejection::unauthorized("no session")),
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rejection_with_custom_status() {
        let err = ProxyError::Identity {
            source: Box::new(IdentityRejection::new(StatusCode::FORBIDDEN, "not a member")),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Identity resolution failed: not a member");
    }

    #[test]
    fn plain_identity_error_is_internal() {
        let err = ProxyError::Identity {
            source: "session store offline".into(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_errors_map_to_gateway_statuses() {
        let err = ProxyError::Upstream {
            source: "connection refused".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err = ProxyError::UpstreamTimeout(Duration::from_millis(250));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.to_string(), "Upstream request timed out after 250ms");
    }

    #[test]
    fn validation_errors_render_with_suggestions() {
        let err = ProxyError::ConfigValidation {
            errors: vec![ValidationError {
                section: "proxy".into(),
                field: "target".into(),
                message: "unsupported scheme 'ftp'".into(),
                suggestion: Some("use http:// or https://".into()),
            }],
        };
        assert_eq!(
            err.to_string(),
            "Config validation failed:\n  proxy.target: unsupported scheme 'ftp' (use http:// or https://)"
        );
    }
}
