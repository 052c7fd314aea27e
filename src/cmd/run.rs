//! `couchdb-auth-proxy run`: start the proxy server.
//!
//! Loads the optional config file, applies CLI / env overrides, builds the
//! shared [`AuthProxy`] around the built-in forwarded-header resolver,
//! and serves until SIGTERM / Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::{self, model::Config, validation};
use crate::error::ProxyError;
use crate::logging;
use crate::proxy::{AuthProxy, Resolver};
use crate::server;

pub async fn execute(args: RunArgs) -> Result<(), ProxyError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let mut config = match config::discover(args.config.as_deref()).await? {
        Some(path) => config::load(&path).await?,
        None => {
            tracing::info!("no config file found, using defaults");
            Config::default()
        }
    };
    apply_overrides(&mut config, &args)?;

    let Config { proxy, identity } = config;
    if proxy.via.is_none() {
        tracing::warn!("no via pseudonym configured, responses will not carry a Via entry");
    }

    let resolver = Resolver::from_resolver(identity);
    let proxy = Arc::new(AuthProxy::new((resolver, proxy))?);
    let settings = proxy.settings();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        target = %settings.target,
        signing = settings.secret.is_some(),
        info = settings.info.is_some(),
        "couchdb-auth-proxy started"
    );

    let router = server::build_router(proxy);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!("couchdb-auth-proxy stopped");
    Ok(())
}

/// CLI flags and env vars win over the config file. The merged result is
/// validated again so an override cannot slip past the file checks.
fn apply_overrides(config: &mut Config, args: &RunArgs) -> Result<(), ProxyError> {
    if let Some(target) = &args.target {
        config.proxy.target.clone_from(target);
    }
    if let Some(secret) = &args.secret {
        config.proxy.secret = Some(secret.clone());
    }
    if let Some(via) = &args.via {
        config.proxy.via = Some(via.clone());
    }
    validation::validate(config).map_err(|errors| ProxyError::ConfigValidation { errors })
}
