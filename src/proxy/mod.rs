//! The request interception pipeline.
//!
//! [`AuthProxy`] is built once and shared across requests. For each
//! request it:
//!
//! 1. decides whether the root response gets proxy metadata ([`inject`]),
//! 2. resolves the caller's identity through the configured [`Resolver`],
//! 3. sanitizes and rewrites the trusted CouchDB headers ([`headers`]),
//! 4. forwards through the [`Transport`],
//! 5. appends this proxy to the response `Via` chain.
//!
//! A failure in steps 1-2 ends the request before anything is forwarded.

pub mod adapter;
pub mod headers;
pub mod identity;
pub mod inject;
pub mod settings;
pub mod sign;
pub mod transport;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use http::{Method, Request, Response};
use axum::response::IntoResponse;
use http_body_util::BodyExt;

use crate::error::ProxyError;

pub use adapter::{Completion, IdentityResolver, ResolveResult, Resolver};
pub use identity::{ForwardedUserResolver, Identity};
pub use settings::{ProxyArgs, ProxyOptions, ProxySettings};
pub use transport::{HyperTransport, Transport};

/// Continuation that turns a pipeline error into a response.
pub type ErrorHandler = Arc<dyn Fn(ProxyError) -> Response<Body> + Send + Sync>;

pub struct AuthProxy {
    resolver: Resolver,
    settings: ProxySettings,
    transport: Arc<dyn Transport>,
    on_error: Option<ErrorHandler>,
}

impl AuthProxy {
    /// Build a proxy forwarding through a [`HyperTransport`] to the
    /// configured target. Accepts `(resolver, options)`,
    /// `(options, resolver)`, or a bare resolver.
    pub fn new(args: impl Into<ProxyArgs>) -> Result<Self, ProxyError> {
        let ProxyArgs { resolver, options } = args.into();
        let settings = ProxySettings::resolve(&options)?;
        let transport = HyperTransport::new(settings.target.clone(), settings.transport.clone());
        Ok(Self::from_parts(resolver, settings, Arc::new(transport)))
    }

    /// Build a proxy around an existing transport.
    pub fn with_transport(
        args: impl Into<ProxyArgs>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ProxyError> {
        let ProxyArgs { resolver, options } = args.into();
        let settings = ProxySettings::resolve(&options)?;
        Ok(Self::from_parts(resolver, settings, transport))
    }

    #[must_use]
    pub fn from_parts(
        resolver: Resolver,
        settings: ProxySettings,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            resolver,
            settings,
            transport,
            on_error: None,
        }
    }

    /// Route pipeline errors to `handler` instead of the default error response.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(ProxyError) -> Response<Body> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Run the pipeline, returning errors to the caller.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        let version = parts.version;

        let inject_info = self
            .settings
            .info
            .as_ref()
            .filter(|_| parts.method != Method::HEAD && inject::applies_to(parts.uri.path()));

        let identity = self
            .resolver
            .resolve(&parts)
            .await
            .map_err(|source| match source.downcast::<ProxyError>() {
                Ok(err) => *err,
                Err(source) => ProxyError::Identity { source },
            })?;

        let fields = &self.settings.header_fields;
        match identity {
            Some(identity) => {
                headers::inject_identity(
                    &mut parts.headers,
                    fields,
                    &identity,
                    self.settings.secret.as_deref(),
                )?;
                tracing::debug!(
                    user = %identity.username(),
                    roles = %identity.roles_header(),
                    signed = self.settings.secret.is_some(),
                    "identity injected"
                );
            }
            None => {
                headers::clean_headers(&mut parts.headers, &fields.names());
                tracing::debug!("no identity, forwarding anonymously");
            }
        }

        let response = self
            .transport
            .forward(Request::from_parts(parts, body))
            .await?;

        let (mut parts, body) = response.into_parts();
        if let Some(via) = &self.settings.via {
            headers::append_via(&mut parts.headers, version, via);
        }

        let body = match inject_info {
            Some(info) => {
                let collected = body
                    .collect()
                    .await
                    .map_err(|e| ProxyError::Upstream {
                        source: Box::new(e),
                    })?
                    .to_bytes();
                let rewritten = inject::inject_proxy_info(collected.clone(), info);
                if rewritten != collected {
                    parts.headers.remove(hyper::header::CONTENT_LENGTH);
                }
                Body::from(rewritten)
            }
            None => body,
        };

        Ok(Response::from_parts(parts, body))
    }

    /// Run the pipeline; errors go to the `on_error` continuation when one
    /// is set, otherwise they render as a CouchDB-style error response.
    pub async fn call(&self, request: Request<Body>) -> Response<Body> {
        let correlation_id = request
            .headers()
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match self.handle(request).await {
            Ok(response) => {
                tracing::info!(
                    correlation_id = %correlation_id,
                    method = %method,
                    path = %path,
                    status = response.status().as_u16(),
                    "request proxied"
                );
                response
            }
            Err(e) => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    method = %method,
                    path = %path,
                    error = %e,
                    "request failed"
                );
                match &self.on_error {
                    Some(handler) => handler(e),
                    None => e.into_response(),
                }
            }
        }
    }
}

/// Axum fallback handler forwarding every request through the shared proxy.
pub async fn proxy_handler(
    State(proxy): State<Arc<AuthProxy>>,
    request: Request<Body>,
) -> Response<Body> {
    proxy.call(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, StatusCode, Version};
    use tokio::sync::Mutex;

    use crate::error::IdentityRejection;

    /// Records forwarded request headers and answers with a canned response.
    struct Recording {
        seen: Mutex<Vec<HeaderMap>>,
        status: StatusCode,
        body: &'static str,
        via: Option<&'static str>,
    }

    impl Recording {
        fn new(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                status: StatusCode::OK,
                body,
                via: None,
            })
        }

        async fn last_headers(&self) -> HeaderMap {
            self.seen.lock().await.last().cloned().unwrap()
        }

        async fn calls(&self) -> usize {
            self.seen.lock().await.len()
        }
    }

    #[async_trait]
    impl Transport for Recording {
        async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
            self.seen.lock().await.push(request.headers().clone());
            let mut builder = Response::builder()
                .status(self.status)
                .header("content-length", self.body.len());
            if let Some(via) = self.via {
                builder = builder.header("via", via);
            }
            Ok(builder.body(Body::from(self.body)).unwrap())
        }
    }

    fn alice() -> Resolver {
        Resolver::sync(|_| Ok(Some(Identity::new("alice").with_roles(["admin", "ops"]))))
    }

    fn proxy(resolver: Resolver, options: ProxyOptions, transport: Arc<Recording>) -> AuthProxy {
        AuthProxy::with_transport((resolver, options), transport).unwrap()
    }

    fn spoofed(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-auth-couchdb-username", "admin")
            .header("x-auth-couchdb-roles", "_admin")
            .header("x-auth-couchdb-token", "forged")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn injects_signed_identity() {
        let transport = Recording::new("{}");
        let proxy = proxy(alice(), ProxyOptions::default().secret("k"), transport.clone());

        proxy.handle(spoofed("/db")).await.unwrap();

        let headers = transport.last_headers().await;
        assert_eq!(headers.get("x-auth-couchdb-username").unwrap(), "alice");
        assert_eq!(headers.get("x-auth-couchdb-roles").unwrap(), "admin,ops");
        assert_eq!(
            headers.get("x-auth-couchdb-token").unwrap(),
            sign::sign("alice", "k").as_str()
        );
    }

    #[tokio::test]
    async fn null_identity_sets_nothing_and_strips_spoofs() {
        let transport = Recording::new("{}");
        let proxy = proxy(Resolver::anonymous(), ProxyOptions::default().secret("k"), transport.clone());

        proxy.handle(spoofed("/db")).await.unwrap();

        let headers = transport.last_headers().await;
        assert!(headers.get("x-auth-couchdb-username").is_none());
        assert!(headers.get("x-auth-couchdb-roles").is_none());
        assert!(headers.get("x-auth-couchdb-token").is_none());
    }

    #[tokio::test]
    async fn resolver_failure_short_circuits() {
        let transport = Recording::new("{}");
        let proxy = proxy(
            Resolver::sync(|_| Err("session store offline".into())),
            ProxyOptions::default(),
            transport.clone(),
        );

        let err = proxy.handle(spoofed("/")).await.unwrap_err();
        assert!(matches!(err, ProxyError::Identity { .. }));
        assert_eq!(transport.calls().await, 0);
    }

    #[tokio::test]
    async fn dropped_completion_surfaces_as_itself() {
        let transport = Recording::new("{}");
        let proxy = proxy(
            Resolver::callback(|_, done| {
                drop(done);
                Ok(())
            }),
            ProxyOptions::default(),
            transport.clone(),
        );

        let err = proxy.handle(spoofed("/")).await.unwrap_err();
        assert!(matches!(err, ProxyError::CompletionDropped));
    }

    #[tokio::test]
    async fn error_continuation_receives_failure() {
        let transport = Recording::new("{}");
        let proxy = proxy(
            Resolver::sync(|_| Err(IdentityRejection::unauthorized("who are you").into())),
            ProxyOptions::default(),
            transport.clone(),
        )
        .on_error(|e| {
            Response::builder()
                .status(StatusCode::IM_A_TEAPOT)
                .body(Body::from(e.to_string()))
                .unwrap()
        });

        let response = proxy.call(spoofed("/db")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            body_string(response).await,
            "Identity resolution failed: who are you"
        );
        assert_eq!(transport.calls().await, 0);
    }

    #[tokio::test]
    async fn error_without_continuation_renders_status() {
        let transport = Recording::new("{}");
        let proxy = proxy(
            Resolver::sync(|_| Err(IdentityRejection::unauthorized("who are you").into())),
            ProxyOptions::default(),
            transport,
        );

        let response = proxy.call(spoofed("/db")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["reason"], "who are you");
    }

    #[tokio::test]
    async fn root_json_gains_proxy_info() {
        let transport = Recording::new(r#"{"ok":true}"#);
        let options = ProxyOptions::default()
            .info(Some(serde_json::json!({"name": "p", "version": "1"})));
        let proxy = proxy(alice(), options, transport);

        let response = proxy.handle(spoofed("/?q=1")).await.unwrap();
        assert!(response.headers().get("content-length").is_none());
        assert_eq!(
            body_string(response).await,
            r#"{"ok":true,"proxy":{"name":"p","version":"1"}}"#
        );
    }

    #[tokio::test]
    async fn non_root_and_disabled_info_untouched() {
        let transport = Recording::new(r#"{"ok":true}"#);
        let proxy_a = proxy(alice(), ProxyOptions::default(), transport.clone());
        let response = proxy_a.handle(spoofed("/db")).await.unwrap();
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);

        let proxy_b = proxy(alice(), ProxyOptions::default().info(None), transport);
        let response = proxy_b.handle(spoofed("/")).await.unwrap();
        assert_eq!(response.headers().get("content-length").unwrap(), "11");
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn head_root_keeps_content_length() {
        let transport = Recording::new(r#"{"ok":true}"#);
        let proxy = proxy(alice(), ProxyOptions::default(), transport);

        let mut request = spoofed("/");
        *request.method_mut() = Method::HEAD;
        let response = proxy.handle(request).await.unwrap();
        assert_eq!(response.headers().get("content-length").unwrap(), "11");
    }

    #[tokio::test]
    async fn untouched_root_body_keeps_content_length() {
        let transport = Recording::new("[1,2,3]");
        let proxy = proxy(alice(), ProxyOptions::default(), transport);

        let response = proxy.handle(spoofed("/")).await.unwrap();
        assert_eq!(response.headers().get("content-length").unwrap(), "7");
        assert_eq!(body_string(response).await, "[1,2,3]");
    }

    #[tokio::test]
    async fn root_non_json_passes_through() {
        let transport = Recording::new("plain text welcome");
        let proxy = proxy(alice(), ProxyOptions::default(), transport);
        let response = proxy.handle(spoofed("/")).await.unwrap();
        assert_eq!(body_string(response).await, "plain text welcome");
    }

    #[tokio::test]
    async fn via_appended_to_upstream_chain() {
        let transport = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            status: StatusCode::OK,
            body: "{}",
            via: Some("1.0 foo"),
        });
        let proxy = proxy(alice(), ProxyOptions::default().via("bar"), transport);

        let response = proxy.handle(spoofed("/db")).await.unwrap();
        assert_eq!(
            response.headers().get("via").unwrap(),
            format!("1.0 foo, 1.1 bar (couchdb-auth-proxy/{})", env!("CARGO_PKG_VERSION")).as_str()
        );
    }

    #[tokio::test]
    async fn via_uses_inbound_version() {
        let transport = Recording::new("{}");
        let proxy = proxy(alice(), ProxyOptions::default().via("gw"), transport);
        let mut request = spoofed("/db");
        *request.version_mut() = Version::HTTP_10;

        let response = proxy.handle(request).await.unwrap();
        assert!(response
            .headers()
            .get("via")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("1.0 gw ("));
    }

    #[tokio::test]
    async fn no_via_without_pseudonym() {
        let transport = Recording::new("{}");
        let proxy = proxy(alice(), ProxyOptions::default(), transport);
        let response = proxy.handle(spoofed("/db")).await.unwrap();
        assert!(response.headers().get("via").is_none());
    }
}
