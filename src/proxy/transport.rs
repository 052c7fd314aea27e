//! Forwarding to the backend.
//!
//! The pipeline hands a fully prepared request to a [`Transport`] and gets
//! the upstream response back. [`HyperTransport`] is the production
//! implementation: a pooled hyper-util client (rustls for `https`
//! targets) that rewrites the request URI onto the target, strips
//! hop-by-hop headers in both directions, and optionally adds
//! `X-Forwarded-*` headers, rewrites `Host`, and bounds the wait for
//! response headers. Bodies stream through untouched.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use http::{HeaderValue, Request, Response, Uri, Version};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use super::headers::{add_forwarded, strip_hop_by_hop};
use super::settings::TransportOptions;
use crate::error::ProxyError;

// async_trait is required here because Transport is used as Arc<dyn Transport>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError>;
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Body>;

#[must_use]
pub fn build_http_client(pool_idle_timeout: Duration) -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring` as the default.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(pool_idle_timeout)
        .build(https)
}

pub struct HyperTransport {
    client: HttpClient,
    target: Url,
    options: TransportOptions,
}

impl HyperTransport {
    #[must_use]
    pub fn new(target: Url, options: TransportOptions) -> Self {
        let client = build_http_client(Duration::from_secs(options.pool_idle_timeout_secs));
        Self {
            client,
            target,
            options,
        }
    }

    fn prepare(&self, request: Request<Body>) -> Result<Request<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        parts.uri = upstream_uri(&self.target, path_and_query)?;

        // The pooled client only speaks HTTP/1.1 to the backend
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);

        if self.options.xfwd {
            let client_ip = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string());
            if let Some(ip) = client_ip {
                add_forwarded(&mut parts.headers, &ip, "http");
            }
        }

        if self.options.change_origin {
            if let Some(authority) = self.target_authority() {
                parts.headers.insert(hyper::header::HOST, authority);
            }
        }

        Ok(Request::from_parts(parts, body))
    }

    fn target_authority(&self) -> Option<HeaderValue> {
        let host = self.target.host_str()?;
        let value = self
            .target
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        HeaderValue::from_str(&value).ok()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let request = self.prepare(request)?;
        let uri = request.uri().clone();

        let pending = self.client.request(request);
        let result = match self.options.timeout_ms {
            Some(ms) => {
                let timeout = Duration::from_millis(ms);
                tokio::time::timeout(timeout, pending)
                    .await
                    .map_err(|_| ProxyError::UpstreamTimeout(timeout))?
            }
            None => pending.await,
        };

        let response = result.map_err(|e| {
            tracing::warn!(upstream = %uri, error = %e, "upstream request failed");
            ProxyError::Upstream {
                source: Box::new(e),
            }
        })?;

        let (mut parts, incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(incoming)))
    }
}

/// Join the inbound path and query onto the target base URL.
///
/// A target with a path prefix (`http://couch:5984/db-proxy`) keeps it.
pub fn upstream_uri(target: &Url, path_and_query: &str) -> Result<Uri, ProxyError> {
    let base = target.as_str().trim_end_matches('/');
    let suffix = if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{path_and_query}")
    };
    format!("{base}{suffix}")
        .parse::<Uri>()
        .map_err(|e| ProxyError::InvalidTarget {
            url: target.to_string(),
            reason: e.to_string(),
        })
}
