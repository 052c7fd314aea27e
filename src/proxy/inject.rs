//! Root-response metadata injection.
//!
//! CouchDB answers `GET /` with a small JSON welcome document. When
//! proxy metadata is configured, that document gains a `proxy` property
//! so clients can tell they are talking through this proxy. Anything that
//! is not a JSON object passes through byte-for-byte.

use bytes::Bytes;
use serde_json::Value;

/// Whether a request path is eligible for metadata injection.
#[must_use]
pub fn applies_to(path: &str) -> bool {
    path == "/"
}

/// Merge `info` into `body` under `proxy`, or return `body` unchanged.
#[must_use]
pub fn inject_proxy_info(body: Bytes, info: &Value) -> Bytes {
    let Ok(text) = std::str::from_utf8(&body) else {
        return body;
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut map)) => {
            map.insert("proxy".to_string(), info.clone());
            match serde_json::to_vec(&Value::Object(map)) {
                Ok(rewritten) => Bytes::from(rewritten),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to re-serialize root body");
                    body
                }
            }
        }
        Ok(_) => body,
        Err(e) => {
            tracing::debug!(error = %e, "root body is not JSON, passing through");
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adds_proxy_to_object() {
        let out = inject_proxy_info(
            Bytes::from_static(br#"{"ok":true}"#),
            &json!({"name": "p", "version": "1"}),
        );
        assert_eq!(&out[..], br#"{"ok":true,"proxy":{"name":"p","version":"1"}}"#);
    }

    #[test]
    fn keeps_upstream_key_order() {
        let body = br#"{"couchdb":"Welcome","version":"3.3.3","vendor":{"name":"The Apache Software Foundation"}}"#;
        let out = inject_proxy_info(Bytes::from_static(body), &json!("gw"));
        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            r#"{"couchdb":"Welcome","version":"3.3.3","vendor":{"name":"The Apache Software Foundation"},"proxy":"gw"}"#
        );
    }

    #[test]
    fn replaces_existing_proxy_key() {
        let out = inject_proxy_info(Bytes::from_static(br#"{"proxy":1}"#), &json!(2));
        assert_eq!(&out[..], br#"{"proxy":2}"#);
    }

    #[test]
    fn non_json_passes_through() {
        let body = Bytes::from_static(b"<html>not json</html>");
        assert_eq!(inject_proxy_info(body.clone(), &json!({})), body);
    }

    #[test]
    fn non_object_json_passes_through() {
        let cases: [&[u8]; 3] = [b"null", b"[1, 2]", b"  42 "];
        for raw in cases {
            let body = Bytes::copy_from_slice(raw);
            assert_eq!(inject_proxy_info(body.clone(), &json!({})), body);
        }
    }

    #[test]
    fn invalid_utf8_passes_through() {
        let body = Bytes::from_static(&[0xff, 0xfe, b'{', b'}']);
        assert_eq!(inject_proxy_info(body.clone(), &json!({})), body);
    }

    #[test]
    fn only_root_path_applies() {
        assert!(applies_to("/"));
        assert!(!applies_to("/_all_dbs"));
        assert!(!applies_to(""));
    }
}
