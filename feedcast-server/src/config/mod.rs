//! Configuration module for feedcast-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,

    #[error("[elasticsearch] section is required by the query service")]
    MissingElasticsearch,
}

/// Validated configuration shared by every service role.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub nats_address: String,
    pub elasticsearch: Option<Url>,
}

impl LoadedConfig {
    /// The search cluster address, for roles that cannot run without one.
    pub fn require_elasticsearch(&self) -> Result<&Url, ConfigError> {
        self.elasticsearch
            .as_ref()
            .ok_or(ConfigError::MissingElasticsearch)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
    nats_override: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(
        config_path: impl AsRef<Path>,
        listen_override: Option<SocketAddr>,
        nats_override: Option<String>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            nats_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(nats) = &self.nats_override {
            file_config.nats.address = nats.clone();
        }

        validate(&file_config)?;

        Ok(LoadedConfig {
            listen: file_config.server.listen,
            nats_address: file_config.nats.address,
            elasticsearch: file_config.elasticsearch.map(|es| es.address),
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let nats = config.nats.address.trim();
    if nats.is_empty() {
        return Err(ConfigError::ValidationError(
            "nats.address must not be empty".to_string(),
        ));
    }
    if !nats.starts_with("nats://") {
        return Err(ConfigError::ValidationError(format!(
            "nats.address {nats:?} must use the nats:// scheme"
        )));
    }
    if let Some(es) = &config.elasticsearch
        && !matches!(es.address.scheme(), "http" | "https")
    {
        return Err(ConfigError::ValidationError(format!(
            "elasticsearch.address {} must use http or https",
            es.address
        )));
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("unused.toml", None, None)
    }

    #[test]
    fn test_overrides_win_over_file() {
        let loader = ConfigLoader::new(
            "unused.toml",
            Some("127.0.0.1:9999".parse().unwrap()),
            Some("nats://override:4222".to_string()),
        );
        let config = loader
            .load_str("[nats]\naddress = \"nats://file:4222\"\n")
            .unwrap();
        assert_eq!(config.listen.port(), 9999);
        assert_eq!(config.nats_address, "nats://override:4222");
    }

    #[test]
    fn test_rejects_bad_nats_scheme() {
        let err = loader()
            .load_str("[nats]\naddress = \"http://broker:4222\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_bad_elasticsearch_scheme() {
        let err = loader()
            .load_str("[elasticsearch]\naddress = \"ftp://search\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_elasticsearch_required_only_on_demand() {
        let config = loader().load_str("").unwrap();
        assert!(matches!(
            config.require_elasticsearch(),
            Err(ConfigError::MissingElasticsearch)
        ));
    }
}
