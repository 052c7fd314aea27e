//! Per-format config file sources.
//!
//! Provides the file-based sources (YAML, JSON, TOML) gated by feature
//! flags, [`create_file_source`] for picking one by extension, and the
//! [`parse_config_str`] helper for format-specific deserialization.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use std::path::Path;

use crate::config::model::Config;
use crate::error::ProxyError;
use file_source::FileSource;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, ProxyError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| ProxyError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| ProxyError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| ProxyError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(ProxyError::UnsupportedFormat(other.to_string())),
    }
}

/// Pick the file source matching `path`'s extension.
pub fn create_file_source(path: &Path) -> Result<FileSource, ProxyError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(yaml::new(path.to_path_buf())),

        #[cfg(feature = "json")]
        "json" => Ok(json::new(path.to_path_buf())),

        #[cfg(feature = "toml")]
        "toml" => Ok(toml_source::new(path.to_path_buf())),

        other => Err(ProxyError::UnsupportedFormat(other.to_string())),
    }
}
