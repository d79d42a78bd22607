//! Configuration management for ClipBridge
//!
//! This module handles loading, validating, and managing configuration
//! for the ClipBridge service.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Socket address the HTTP bridge listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Staging directory configuration
    #[serde(default)]
    pub staging: StagingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Desktop notification configuration
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Staging directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory for pushed files; relative paths are resolved against the
    /// executable's directory
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Value clients must send in `X-API-Version`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

/// Desktop notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Whether to notify on pull/push
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    /// Pending notifications kept before new ones are dropped
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0:8086".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_api_version() -> String {
    crate::API_VERSION.to_string()
}

fn default_max_body_size() -> usize {
    104_857_600 // 100MB
}

fn default_notify_enabled() -> bool {
    true
}

fn default_queue_size() -> usize {
    64
}

// Default implementations
impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            queue_size: default_queue_size(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            staging: StagingConfig::default(),
            server: ServerConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from CLIPBRIDGE_CONFIG environment variable
    /// 2. ~/.config/clipbridge/config.toml
    /// 3. Falls back to defaults if none exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration with optional custom path
    pub fn load_config(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate_config()?;
        Ok(config)
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clipbridge").join("config.toml"))
    }

    /// Find configuration file path
    fn find_config_path() -> Option<PathBuf> {
        // Check environment variable first
        if let Ok(path) = std::env::var("CLIPBRIDGE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_path().filter(|p| p.exists())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "listen_addr {:?} is not a socket address",
                self.listen_addr
            ))
        })
    }

    /// Validate configuration values
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.staging.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "staging.temp_dir must not be empty".to_string(),
            ));
        }

        if self.server.api_version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.api_version must not be empty".to_string(),
            ));
        }

        if self.server.max_body_size < 1024 {
            return Err(ConfigError::Validation(
                "server.max_body_size must be at least 1024 bytes (1KB)".to_string(),
            ));
        }

        if self.notify.queue_size < 1 {
            return Err(ConfigError::Validation(
                "notify.queue_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Write the commented example configuration to `path`
    pub fn write_example(path: &Path, force: bool) -> Result<(), ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_example())?;
        Ok(())
    }

    /// Serialize the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate example configuration file
    pub fn generate_example() -> String {
        let config = Config::default();

        format!(
            r#"# ClipBridge Configuration File
# Location: ~/.config/clipbridge/config.toml

# Address the HTTP bridge listens on
listen_addr = "{}"

# Logging level (trace, debug, info, warn, error)
log_level = "{}"

# Staging of pushed files
[staging]
# Relative paths are resolved against the executable's directory
temp_dir = "{}"

# HTTP server settings
[server]
# Version clients must send in X-API-Version
api_version = "{}"
# Maximum request body size in bytes (100MB default)
max_body_size = {}

# Desktop notifications
[notify]
enabled = {}
queue_size = {}
"#,
            config.listen_addr,
            config.log_level,
            config.staging.temp_dir.display(),
            config.server.api_version,
            config.server.max_body_size,
            config.notify.enabled,
            config.notify.queue_size,
        )
    }
}
