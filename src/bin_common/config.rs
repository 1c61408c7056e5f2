//! Application configuration
//!
//! One YAML file with a section per component. `.env` and the process
//! environment override the endpoints and the log level.

use keytone_api::ApiConfig;
use keytone_sessions::SessionConfig;
use pulsesocket::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const WS_URL_VAR: &str = "KEYTONE_WS_URL";
pub const API_URL_VAR: &str = "KEYTONE_API_URL";
pub const LOG_LEVEL_VAR: &str = "KEYTONE_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub realtime: ClientConfig,
    pub sessions: SessionConfig,
    pub api: ApiConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            realtime: ClientConfig::new("ws://localhost:3001"),
            sessions: SessionConfig::default(),
            api: ApiConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml(&yaml_content)?;

        // Load .env file
        dotenv::dotenv().ok();
        config.apply_env_overrides(|name| std::env::var(name).ok());

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file means all defaults
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `KEYTONE_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(WS_URL_VAR) {
            info!("Overriding WebSocket URL from environment variable");
            self.realtime.url = url;
        }
        if let Some(url) = lookup(API_URL_VAR) {
            info!("Overriding API URL from environment variable");
            self.api.base_url = url;
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.realtime
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("realtime: {}", e)))?;
        self.sessions
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("sessions: {}", e)))?;
        self.api
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("api: {}", e)))?;
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "log_level must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  WebSocket URL: {}", self.realtime.url);
        info!(
            "  Heartbeat: {} ms, reconnect base {} ms (max {} attempts)",
            self.realtime.heartbeat_interval_ms,
            self.realtime.reconnect_interval_ms,
            self.realtime.max_reconnect_attempts
        );
        info!(
            "  Queue: max {}, backpressure at {}",
            self.realtime.max_queue_size, self.realtime.backpressure_threshold
        );
        info!("  API URL: {}", self.api.base_url);
        info!(
            "  Sessions: {}h lifetime, storage {}",
            self.sessions.auto_delete_hours,
            self.sessions.storage_path.as_deref().unwrap_or("in-memory")
        );
        info!("  Log level: {}", self.log_level);
    }
}
