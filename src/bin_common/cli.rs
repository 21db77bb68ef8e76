//! CLI utilities for binaries
//!
//! Resolves the configuration path from the environment.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Bridge configuration (wsstocommand/config.yaml)
    Bridge,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Bridge => "wsstocommand/config.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "WSS_CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use wss_to_command::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Bridge);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_paths() {
        assert_eq!(ConfigType::Bridge.default_path(), "wsstocommand/config.yaml");

        let custom = ConfigType::Custom("custom/path.yaml".to_string());
        assert_eq!(custom.default_path(), "custom/path.yaml");
    }

    #[test]
    fn test_config_type_env_vars() {
        assert_eq!(ConfigType::Bridge.env_var_name(), "WSS_CONFIG_PATH");
        assert_eq!(
            ConfigType::Custom("x.yaml".into()).env_var_name(),
            "WSS_CONFIG_PATH"
        );
    }
}
