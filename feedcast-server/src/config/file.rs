//! TOML file configuration structures.
//!
//! These structs directly map to the `feedcast.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    /// Only required by the `query` role.
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Broker configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL (e.g., "nats://localhost:4222").
    #[serde(default = "default_nats_address")]
    pub address: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            address: default_nats_address(),
        }
    }
}

fn default_nats_address() -> String {
    "nats://localhost:4222".to_string()
}

/// Search index configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster (e.g., "http://localhost:9200").
    pub address: Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[nats]
address = "nats://broker:4222"

[elasticsearch]
address = "http://search:9200"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.nats.address, "nats://broker:4222");
        assert_eq!(
            config.elasticsearch.unwrap().address.as_str(),
            "http://search:9200/"
        );
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.nats.address, "nats://localhost:4222");
        assert!(config.elasticsearch.is_none());
    }
}
