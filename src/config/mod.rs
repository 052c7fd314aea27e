//! Configuration loading and validation.
//!
//! A config file is optional: without one the proxy runs on defaults plus
//! CLI overrides. [`discover`] finds a file (explicit path first, then the
//! conventional names in the working directory) and [`load`] parses and
//! validates it. Submodules provide the data model, validation logic, and
//! the per-format file sources.

pub mod model;
pub mod sources;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::error::ProxyError;
use model::Config;

/// File names probed in the working directory, in order.
pub const CANDIDATES: &[&str] = &[
    "couchdb-auth-proxy.yaml",
    "couchdb-auth-proxy.yml",
    "couchdb-auth-proxy.json",
    "couchdb-auth-proxy.toml",
];

/// Pick the config file to use, if any.
pub async fn discover(explicit: Option<&Path>) -> Result<Option<PathBuf>, ProxyError> {
    if let Some(path) = explicit {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ProxyError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    for name in CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Parse and validate the config file at `path`.
pub async fn load(path: &Path) -> Result<Config, ProxyError> {
    sources::create_file_source(path)?.load().await
}
