//! Configuration module for roomcast.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, RoomcastError};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/roomcast.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/roomcast.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Session token verification.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// HS256 secret shared with the token issuer.
    #[serde(default)]
    pub jwt_secret: String,
}

/// Chat engine tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// History page size when the caller does not ask for one.
    #[serde(default = "default_history_limit")]
    pub default_history_limit: u32,
    /// Upper bound for a single history page.
    #[serde(default = "default_max_history_limit")]
    pub max_history_limit: u32,
    /// Maximum message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Pending deliveries a live subscriber may buffer before it is dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// User search result count when the caller does not ask for one.
    #[serde(default = "default_search_limit")]
    pub default_search_limit: u32,
    /// Upper bound for user search results.
    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: u32,
}

fn default_history_limit() -> u32 {
    20
}

fn default_max_history_limit() -> u32 {
    100
}

fn default_max_message_length() -> usize {
    4000
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_search_limit() -> u32 {
    20
}

fn default_max_search_limit() -> u32 {
    50
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_history_limit: default_history_limit(),
            max_history_limit: default_max_history_limit(),
            max_message_length: default_max_message_length(),
            subscriber_buffer: default_subscriber_buffer(),
            default_search_limit: default_search_limit(),
            max_search_limit: default_max_search_limit(),
        }
    }
}

impl ChatConfig {
    /// Clamp a requested page size into `[1, max_history_limit]`.
    pub fn history_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_history_limit)
            .clamp(1, self.max_history_limit)
    }

    /// Clamp a requested user search size into `[1, max_search_limit]`.
    pub fn search_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_search_limit)
            .clamp(1, self.max_search_limit)
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebConfig {
    /// CORS allowed origins. Empty means permissive development mode.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token verification.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Chat engine tuning.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RoomcastError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RoomcastError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ROOMCAST_JWT_SECRET`: Override the JWT secret key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("ROOMCAST_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.auth.jwt_secret = jwt_secret;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(RoomcastError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via ROOMCAST_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        let chat = &self.chat;
        if chat.max_history_limit == 0 || chat.default_history_limit > chat.max_history_limit {
            return Err(RoomcastError::Config(format!(
                "invalid history limits: default {} / max {}",
                chat.default_history_limit, chat.max_history_limit
            )));
        }
        if chat.max_search_limit == 0 || chat.default_search_limit > chat.max_search_limit {
            return Err(RoomcastError::Config(format!(
                "invalid search limits: default {} / max {}",
                chat.default_search_limit, chat.max_search_limit
            )));
        }
        if chat.subscriber_buffer == 0 {
            return Err(RoomcastError::Config(
                "subscriber_buffer must be at least 1".to_string(),
            ));
        }
        if chat.max_message_length == 0 {
            return Err(RoomcastError::Config(
                "max_message_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
