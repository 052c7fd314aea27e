//! Generic async file-based config source.
//!
//! [`FileSource`] works for any file format by accepting a
//! deserialization function at construction time. It reads the file
//! asynchronously via Tokio and validates the result.

use std::path::PathBuf;

use crate::config::model::Config;
use crate::config::validation::validate;
use crate::error::{BoxError, ProxyError};

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: fn(&str) -> Result<Config, BoxError>,
}

impl FileSource {
    #[must_use]
    pub fn new(
        path: PathBuf,
        name: &'static str,
        deserialize: fn(&str) -> Result<Config, BoxError>,
    ) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    async fn read_content(&self) -> Result<String, ProxyError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProxyError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                ProxyError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<Config, ProxyError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|e| ProxyError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if let Err(errors) = validate(&config) {
            return Err(ProxyError::ConfigValidation { errors });
        }

        tracing::debug!(path = %self.path.display(), format = self.name, "config loaded");
        Ok(config)
    }
}
