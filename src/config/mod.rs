//! Configuration loading and validation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::AggregatorConfig;
use crate::fetch::FetcherConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Platform API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the platform API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request socket timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Listing page size; a shorter page ends pagination
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Hard ceiling on listing pages fetched per request
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Concurrent profile lookups during enrichment
    #[serde(default = "default_profile_concurrency")]
    pub profile_concurrency: usize,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://www.showroom-live.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_page_size() -> usize {
    30
}

fn default_max_pages() -> u32 {
    60
}

fn default_profile_concurrency() -> usize {
    8
}

fn default_user_agent() -> String {
    format!("liveboard/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            profile_concurrency: default_profile_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

impl PlatformConfig {
    /// Derive the fetcher configuration.
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Derive the aggregator configuration.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            page_size: self.page_size,
            max_pages: self.max_pages,
            profile_concurrency: self.profile_concurrency,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin; `*` allows any origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            platform: PlatformConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.platform.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Platform timeout must be greater than 0".to_string(),
            ));
        }

        if self.platform.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "Page size must be greater than 0".to_string(),
            ));
        }

        if self.platform.max_pages == 0 {
            return Err(ConfigError::ValidationError(
                "Max pages must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
