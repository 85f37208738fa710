//! Configuration module for filevault.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{Result, VaultError};

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
    8080
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
    "data/filevault.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory prepended to every storage path root.
    #[serde(default = "default_files_root")]
    pub files_root: String,
    /// Size of each write increment in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_files_root() -> String {
    "data/files".to_string()
}

fn default_chunk_size() -> usize {
    4096
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            files_root: default_files_root(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of an issued handshake code in seconds.
    #[serde(default = "default_handshake_ttl")]
    pub handshake_ttl_secs: u64,
    /// Lifetime of a cached resolved file path in seconds.
    #[serde(default = "default_path_ttl")]
    pub path_ttl_secs: u64,
    /// Maximum number of cached resolved paths.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Maximum number of outstanding handshake codes.
    #[serde(default = "default_handshake_capacity")]
    pub handshake_capacity: u64,
}

fn default_handshake_ttl() -> u64 {
    300
}

fn default_path_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_handshake_capacity() -> u64 {
    10_000
}

impl CacheConfig {
    /// Handshake lifetime as a duration.
    pub fn handshake_ttl(&self) -> Duration {
        Duration::from_secs(self.handshake_ttl_secs)
    }

    /// Resolved path lifetime as a duration.
    pub fn path_ttl(&self) -> Duration {
        Duration::from_secs(self.path_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            handshake_ttl_secs: default_handshake_ttl(),
            path_ttl_secs: default_path_ttl(),
            max_capacity: default_max_capacity(),
            handshake_capacity: default_handshake_capacity(),
        }
    }
}

/// Image processing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    /// WebP quality used when a request does not specify one (1-100).
    #[serde(default = "default_quality")]
    pub default_quality: u8,
}

fn default_quality() -> u8 {
    80
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality(),
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
    "logs/filevault.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
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
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Image processing configuration.
    #[serde(default)]
    pub images: ImagesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEVAULT_FILES_ROOT`: Override the storage files root
    pub fn apply_env_overrides(&mut self) {
        if let Ok(files_root) = std::env::var("FILEVAULT_FILES_ROOT") {
            if !files_root.is_empty() {
                self.storage.files_root = files_root;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.chunk_size == 0 {
            return Err(VaultError::Config(
                "storage.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.cache.handshake_capacity == 0 {
            return Err(VaultError::Config(
                "cache.handshake_capacity must be greater than zero".to_string(),
            ));
        }
        if self.cache.handshake_ttl_secs == 0 || self.cache.path_ttl_secs == 0 {
            return Err(VaultError::Config(
                "cache TTLs must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.images.default_quality) {
            return Err(VaultError::Config(
                "images.default_quality must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }
}
