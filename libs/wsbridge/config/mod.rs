//! Bridge configuration
//!
//! ```yaml
//! send: ping          # keep-alive payload for every endpoint
//! loops: 5            # keep-alive interval in host ticks (20 per second)
//! wss_list:
//!   - host: "ws://localhost:"
//!     port: 8080
//!     send_if_connect: [test]
//!     if_send_message: ["say %message%"]
//! ```
//!
//! The global keys are required. Each `wss_list` entry is validated on its
//! own: a bad entry is logged and skipped while the others still load.

use crate::core::spec::ConnectionSpec;
use crate::traits::BridgeError;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration written when none exists yet
pub const DEFAULT_CONFIG: &str = r#"# Keep-alive payload sent to every endpoint
send: ping
# Keep-alive interval in ticks (20 ticks = 1 second)
loops: 5
wss_list:
  - host: "ws://localhost:"
    port: 8080
    send_if_connect:
      - test
      - test123
      - GG
    if_send_message:
      - "say %message%"
      - "say 123%message%"
      - "say GG%message%"
"#;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(deserialize_with = "string_or_number")]
    send: String,
    loops: u64,
    #[serde(default)]
    wss_list: Vec<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct EndpointConfig {
    host: String,
    #[serde(deserialize_with = "string_or_number")]
    port: String,
    #[serde(default)]
    send_if_connect: Vec<String>,
    #[serde(default)]
    if_send_message: Vec<String>,
}

/// Accept `8080` as well as `"8080"`
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Number(u64),
        Text(String),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Number(n) => n.to_string(),
        Scalar::Text(s) => s,
    })
}

/// Endpoint entry that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEndpoint {
    /// Position in `wss_list`
    pub index: usize,
    pub error: BridgeError,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub send: String,
    pub loops: u64,
    /// Valid endpoints, in declared order
    pub endpoints: Vec<ConnectionSpec>,
    /// Entries that were rejected
    pub skipped: Vec<SkippedEndpoint>,
}

impl BridgeConfig {
    /// Load configuration from a YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml_str(&yaml_content)
    }

    /// Write the default file if it is missing, then load it
    pub fn load_or_create(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        if write_default_config(config_path)? {
            info!("Created default config at {}", config_path.display());
        }
        Self::load(config_path)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;

        let mut endpoints = Vec::with_capacity(raw.wss_list.len());
        let mut skipped = Vec::new();

        for (index, value) in raw.wss_list.into_iter().enumerate() {
            match parse_endpoint(value, &raw.send, raw.loops) {
                Ok(spec) => endpoints.push(spec),
                Err(error) => {
                    warn!("Skipping endpoint #{}: {}", index, error);
                    skipped.push(SkippedEndpoint { index, error });
                }
            }
        }

        Ok(Self {
            send: raw.send,
            loops: raw.loops,
            endpoints,
            skipped,
        })
    }
}

fn parse_endpoint(value: serde_yaml::Value, send: &str, loops: u64) -> crate::Result<ConnectionSpec> {
    let endpoint: EndpointConfig =
        serde_yaml::from_value(value).map_err(|e| BridgeError::ConfigInvalid(e.to_string()))?;

    ConnectionSpec::new(
        endpoint.host,
        endpoint.port,
        send,
        loops,
        endpoint.send_if_connect,
        endpoint.if_send_message,
    )
}

/// Write [`DEFAULT_CONFIG`] to `path` unless a file is already there
///
/// Creates missing parent directories. Returns whether a file was written.
pub fn write_default_config(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = BridgeConfig::from_yaml_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(config.send, "ping");
        assert_eq!(config.loops, 5);
        assert!(config.skipped.is_empty());
        assert_eq!(config.endpoints.len(), 1);

        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.url(), "ws://localhost:8080");
        assert_eq!(endpoint.on_connect_messages(), ["test", "test123", "GG"]);
        assert_eq!(
            endpoint.command_templates(),
            ["say %message%", "say 123%message%", "say GG%message%"]
        );
        assert_eq!(endpoint.periodic_message(), "ping");
        assert_eq!(endpoint.loop_interval_ticks(), 5);
    }

    #[test]
    fn test_missing_port_skips_only_that_endpoint() {
        let yaml = r#"
send: keepalive
loops: 10
wss_list:
  - host: "ws://a:"
    send_if_connect: [hi]
  - host: "ws://b:"
    port: "9001"
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].url(), "ws://b:9001");
        assert!(config.endpoints[0].on_connect_messages().is_empty());

        assert_eq!(config.skipped.len(), 1);
        assert_eq!(config.skipped[0].index, 0);
        assert!(config.skipped[0].error.is_config());
    }

    #[test]
    fn test_invalid_values_are_config_invalid() {
        let yaml = r#"
send: ping
loops: 5
wss_list:
  - host: ""
    port: 80
  - host: "ws://x:"
    port: "http"
  - host: "ws://y:"
    port: 81
    if_send_message: "not a list"
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();

        assert!(config.endpoints.is_empty());
        let indexes: Vec<_> = config.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(config
            .skipped
            .iter()
            .all(|s| matches!(s.error, BridgeError::ConfigInvalid(_))));
    }

    #[test]
    fn test_zero_loops_rejects_every_endpoint() {
        let yaml = "send: ping\nloops: 0\nwss_list:\n  - host: \"ws://a:\"\n    port: 1\n";
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.skipped.len(), 1);
    }

    #[test]
    fn test_missing_globals_fail_whole_config() {
        assert!(matches!(
            BridgeConfig::from_yaml_str("loops: 5\nwss_list: []\n"),
            Err(ConfigError::YamlError(_))
        ));
        assert!(matches!(
            BridgeConfig::from_yaml_str("send: ping\nwss_list: []\n"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_empty_endpoint_list() {
        let config = BridgeConfig::from_yaml_str("send: ping\nloops: 5\n").unwrap();
        assert!(config.endpoints.is_empty());
        assert!(config.skipped.is_empty());
    }
}
