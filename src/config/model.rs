//! Serde data structures for the proxy configuration file.
//!
//! [`Config`] has two sections: `proxy` (the [`ProxyOptions`] the
//! pipeline is built from) and `identity` (settings for the built-in
//! [`ForwardedUserResolver`]). Both are optional and strict about
//! unknown fields.

use serde::{Deserialize, Serialize};

use crate::proxy::identity::ForwardedUserResolver;
use crate::proxy::settings::ProxyOptions;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyOptions,

    #[serde(default)]
    pub identity: ForwardedUserResolver,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.proxy.target, "http://localhost:5984");
        assert_eq!(config.identity.user_header, "x-forwarded-user");
        assert!(config.proxy.info.is_some());
    }

    #[test]
    fn sections_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "proxy": {
                    "via": "gw-1",
                    "secret": "s3cr3t",
                    "target": "http://couch:5984",
                    "header_fields": {"roles": "X-Groups"},
                    "info": null,
                    "transport": {"timeout_ms": 1500, "xfwd": true}
                },
                "identity": {"user_header": "x-remote-user", "require_user": true}
            }"#,
        )
        .unwrap();
        assert_eq!(config.proxy.via.as_deref(), Some("gw-1"));
        assert!(config.proxy.info.is_none());
        assert_eq!(config.proxy.transport.timeout_ms, Some(1500));
        assert!(config.proxy.transport.xfwd);
        assert_eq!(config.proxy.header_fields.roles.as_deref(), Some("X-Groups"));
        assert!(config.identity.require_user);
        assert_eq!(config.identity.roles_header, "x-forwarded-groups");
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"routes": []}"#).is_err());
    }
}
