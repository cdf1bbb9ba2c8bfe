//! Configuration for the attachment service and the save pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::naming::MAX_NAME_LENGTH;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Settings for one attachment service.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq, Eq)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct DocfileConfig {
    /// Root URL of the OData file service.
    #[builder(default = "default_service_url()")]
    pub service_url: String,

    /// Entity set that accepts uploads and serves downloads.
    #[builder(default = "String::from(\"DocumentFileSet\")")]
    pub upload_entity_set: String,

    /// Entity set addressed by the business-object natural key.
    #[builder(default = "String::from(\"DocObjFileSet\")")]
    pub content_entity_set: String,

    /// Prefix of every minted batch group id.
    #[builder(default = "String::from(\"docfile\")")]
    pub group_prefix: String,

    /// First wait of the placeholder poll, halved on every retry.
    #[builder(default = "2048")]
    pub poll_initial_interval_ms: u64,

    /// Retries before the placeholder poll gives up.
    #[builder(default = "20")]
    pub poll_max_retries: u32,

    /// Longest accepted file name, extension included.
    #[builder(default = "MAX_NAME_LENGTH")]
    pub max_name_length: usize,

    /// Maximum number of files per collection (0 = unlimited).
    #[builder(default = "0")]
    pub max_files: usize,
}

fn default_service_url() -> String {
    "/sap/opu/odata/sap/ZFILE_SRV".to_string()
}

impl DocfileConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check_values(
            self.service_url.as_deref(),
            self.max_name_length,
            self.poll_max_retries,
        )
    }
}

/// Rules shared by the builder and loaded files. Unset values pass.
fn check_values(
    service_url: Option<&str>,
    max_name_length: Option<usize>,
    poll_max_retries: Option<u32>,
) -> Result<(), String> {
    if service_url.is_some_and(|url| url.trim().is_empty()) {
        return Err("Service URL cannot be empty".to_string());
    }
    if max_name_length == Some(0) {
        return Err("Maximum name length must be positive".to_string());
    }
    if poll_max_retries == Some(0) {
        return Err("Poll retries must be positive".to_string());
    }
    Ok(())
}

impl Default for DocfileConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            upload_entity_set: "DocumentFileSet".to_string(),
            content_entity_set: "DocObjFileSet".to_string(),
            group_prefix: "docfile".to_string(),
            poll_initial_interval_ms: 2048,
            poll_max_retries: 20,
            max_name_length: MAX_NAME_LENGTH,
            max_files: 0,
        }
    }
}

impl DocfileConfig {
    /// Create a new config builder.
    pub fn builder() -> DocfileConfigBuilder {
        DocfileConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.check()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source, path)
    }

    /// Location of the user's config file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docfile").join("config.toml"))
    }

    /// Load the user's config file, or defaults when there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Initial wait of the placeholder poll.
    pub fn poll_initial_interval(&self) -> Duration {
        Duration::from_millis(self.poll_initial_interval_ms)
    }

    /// Upload endpoint for new files.
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.service_url.trim_end_matches('/'),
            self.upload_entity_set
        )
    }

    fn check(&self) -> Result<(), ConfigError> {
        check_values(
            Some(&self.service_url),
            Some(self.max_name_length),
            Some(self.poll_max_retries),
        )
        .map_err(|message| ConfigError::Invalid { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DocfileConfig::builder()
            .service_url("/srv")
            .max_files(3usize)
            .build()
            .unwrap();

        assert_eq!(config.service_url, "/srv");
        assert_eq!(config.max_files, 3);
        assert_eq!(config.poll_max_retries, 20);
        assert_eq!(config.upload_url(), "/srv/DocumentFileSet");
    }

    #[test]
    fn test_config_builder_rejects_empty_url() {
        assert!(DocfileConfig::builder().service_url("  ").build().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config =
            DocfileConfig::from_toml_str("max_files = 5\n", Path::new("inline.toml")).unwrap();
        assert_eq!(config.max_files, 5);
        assert_eq!(config.poll_initial_interval(), Duration::from_millis(2048));
    }

    #[test]
    fn test_invalid_toml_values_rejected() {
        let result = DocfileConfig::from_toml_str("poll_max_retries = 0\n", Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_builder_and_file_share_rules() {
        let built = DocfileConfig::builder().max_name_length(0usize).build();
        let loaded = DocfileConfig::from_toml_str("max_name_length = 0\n", Path::new("x.toml"));

        let built = built.unwrap_err().to_string();
        let Err(ConfigError::Invalid { message }) = loaded else {
            panic!("expected an invalid config");
        };
        assert!(built.contains(&message));
    }
}
