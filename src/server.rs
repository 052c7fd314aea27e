//! Axum server setup and graceful shutdown.
//!
//! [`build_router`] mounts the shared [`AuthProxy`] as the fallback for
//! every path (the proxy has no routes of its own, so nothing shadows a
//! CouchDB endpoint) behind a `TraceLayer`. [`shutdown_signal`] resolves
//! on SIGTERM / Ctrl+C.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::proxy::{self, AuthProxy};

pub fn build_router(proxy: Arc<AuthProxy>) -> Router {
    Router::new()
        .fallback(proxy::proxy_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(proxy)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
