//! CLI utilities for binaries
//!
//! Resolves configuration paths from the environment.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Client configuration (config/keytone.yaml)
    App,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::App => "config/keytone.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "KEYTONE_CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
///
/// A [`ConfigType::Custom`] path is used as given.
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = config_type {
        return path.into();
    }
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Command line arguments, program name excluded
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
