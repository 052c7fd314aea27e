//! couchdb-auth-proxy is an authenticating reverse proxy for CouchDB.
//!
//! It sits in front of a CouchDB server configured for proxy
//! authentication. For every request it asks a pluggable identity
//! resolver who the caller is, replaces any client-supplied
//! `X-Auth-CouchDB-*` headers with trusted ones (optionally HMAC-signed
//! with the shared secret), forwards the request, appends itself to the
//! response `Via` chain, and tags the root welcome document with proxy
//! metadata. It does not authenticate anyone itself.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, sign, validate).
//! - [`config`] -- Config file discovery, parsing, and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- The interception pipeline: identity adapter, header
//!   sanitizing and signing, root-body injection, `Via`, and the transport.
//! - [`server`] -- Axum router and graceful shutdown.
//!
//! # Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use couchdb_auth_proxy::proxy::{AuthProxy, Identity, ProxyOptions, Resolver};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::sync(|req| {
//!     Ok(req
//!         .headers
//!         .get("x-user")
//!         .and_then(|v| v.to_str().ok())
//!         .map(|name| Identity::new(name).with_roles(["reader"])))
//! });
//! let options = ProxyOptions::default().secret("s3cr3t").via("gw-1");
//!
//! // Options and resolver may be passed in either order.
//! let proxy = Arc::new(AuthProxy::new((options, resolver))?);
//! let app = couchdb_auth_proxy::server::build_router(proxy);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file format backends |

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;

pub use error::ProxyError;
pub use proxy::sign::sign;
