//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for errors that
//! would otherwise only surface at startup or, worse, per request: bad
//! target URLs, unparseable or colliding header names, and `Via`
//! pseudonyms that cannot be sent as a header value. Returns a list of
//! [`ValidationError`] values with per-field suggestions.

use http::{HeaderName, HeaderValue};

use super::model::Config;
use crate::error::ValidationError;
use crate::proxy::settings::{
    parse_target, DEFAULT_ROLES_HEADER, DEFAULT_TOKEN_HEADER, DEFAULT_USERNAME_HEADER,
};

/// Validate a single header name. Returns `Ok(())` or a human-readable error.
pub fn validate_header_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("header name cannot be empty".into());
    }
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|_| format!("'{name}' is not a valid header name"))
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let proxy = &config.proxy;

    if let Err(e) = parse_target(&proxy.target) {
        let suggestion = if proxy.target.contains("://") {
            None
        } else {
            Some(format!("did you mean 'http://{}'?", proxy.target))
        };
        errors.push(ValidationError {
            section: "proxy".into(),
            field: "target".into(),
            message: e.to_string(),
            suggestion,
        });
    }

    if let Some(via) = &proxy.via {
        if HeaderValue::from_str(via).is_err() {
            errors.push(ValidationError {
                section: "proxy".into(),
                field: "via".into(),
                message: "contains characters not allowed in a header value".into(),
                suggestion: None,
            });
        }
    }

    if proxy.secret.as_deref() == Some("") {
        errors.push(ValidationError {
            section: "proxy".into(),
            field: "secret".into(),
            message: "secret is empty, tokens would not be signed".into(),
            suggestion: Some("remove the field or set the CouchDB [chttpd_auth] secret".into()),
        });
    }

    if proxy.transport.timeout_ms == Some(0) {
        errors.push(ValidationError {
            section: "proxy".into(),
            field: "transport.timeout_ms".into(),
            message: "timeout must be greater than zero".into(),
            suggestion: Some("omit the field to wait indefinitely".into()),
        });
    }

    let overrides = &proxy.header_fields;
    let slots = [
        ("username", overrides.username.as_deref(), DEFAULT_USERNAME_HEADER),
        ("roles", overrides.roles.as_deref(), DEFAULT_ROLES_HEADER),
        ("token", overrides.token.as_deref(), DEFAULT_TOKEN_HEADER),
    ];
    let mut seen = std::collections::HashSet::new();
    for (slot, value, default) in slots {
        let name = value.unwrap_or(default);
        if let Err(msg) = validate_header_name(name) {
            errors.push(ValidationError {
                section: "proxy".into(),
                field: format!("header_fields.{slot}"),
                message: msg,
                suggestion: None,
            });
        } else if !seen.insert(name.to_ascii_lowercase()) {
            errors.push(ValidationError {
                section: "proxy".into(),
                field: format!("header_fields.{slot}"),
                message: format!("'{name}' is already used by another header field"),
                suggestion: None,
            });
        }
    }

    for (field, name) in [
        ("user_header", &config.identity.user_header),
        ("roles_header", &config.identity.roles_header),
    ] {
        if let Err(msg) = validate_header_name(name) {
            errors.push(ValidationError {
                section: "identity".into(),
                field: field.into(),
                message: msg,
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let proxy = &config.proxy;
    let fields = &proxy.header_fields;
    let info = match &proxy.info {
        Some(value) => value.to_string(),
        None => "disabled".to_string(),
    };

    let lines = [
        format!("  target:   {}", proxy.target),
        format!("  via:      {}", proxy.via.as_deref().unwrap_or("(none)")),
        format!(
            "  signing:  {}",
            if proxy.secret.is_some() { "enabled" } else { "disabled" }
        ),
        format!(
            "  headers:  {}, {}, {}",
            fields.username.as_deref().unwrap_or(DEFAULT_USERNAME_HEADER),
            fields.roles.as_deref().unwrap_or(DEFAULT_ROLES_HEADER),
            fields.token.as_deref().unwrap_or(DEFAULT_TOKEN_HEADER),
        ),
        format!("  info:     {info}"),
        format!(
            "  identity: {} / {}{}",
            config.identity.user_header,
            config.identity.roles_header,
            if config.identity.require_user { " (required)" } else { "" }
        ),
    ];

    format!("{path} is valid\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::settings::HeaderFieldOverrides;

    #[test]
    fn default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn target_without_scheme_suggests_http() {
        let mut config = Config::default();
        config.proxy.target = "couch:5984".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].suggestion.as_deref(),
            Some("did you mean 'http://couch:5984'?")
        );
    }

    #[test]
    fn unsupported_scheme_fails() {
        let mut config = Config::default();
        config.proxy.target = "ftp://couch:21".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors[0].message.contains("unsupported scheme"));
    }

    #[test]
    fn colliding_header_fields_fail() {
        let mut config = Config::default();
        config.proxy.header_fields = HeaderFieldOverrides {
            roles: Some("x-auth-couchdb-username".into()),
            ..HeaderFieldOverrides::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == "header_fields.roles" && e.message.contains("already used")));
    }

    #[test]
    fn invalid_header_names_fail() {
        let mut config = Config::default();
        config.proxy.header_fields.token = Some("x token".into());
        config.identity.user_header = String::new();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "header_fields.token"));
        assert!(errors
            .iter()
            .any(|e| e.section == "identity" && e.message.contains("cannot be empty")));
    }

    #[test]
    fn via_with_newline_fails() {
        let mut config = Config::default();
        config.proxy.via = Some("gw\n1".into());
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors[0].field, "via");
    }

    #[test]
    fn empty_secret_and_zero_timeout_fail() {
        let mut config = Config::default();
        config.proxy.secret = Some(String::new());
        config.proxy.transport.timeout_ms = Some(0);
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn report_summarizes_config() {
        let mut config = Config::default();
        config.proxy.via = Some("gw".into());
        config.proxy.info = None;
        let report = format_validation_report("proxy.yaml", &config);
        assert!(report.starts_with("proxy.yaml is valid\n"));
        assert!(report.contains("via:      gw"));
        assert!(report.contains("info:     disabled"));
        assert!(report.contains("signing:  disabled"));
    }
}
