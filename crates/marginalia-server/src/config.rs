//! Configuration management for the server

use anyhow::{Context, Result};
use marginalia::LibraryConfig;
use serde::Deserialize;
use std::str::FromStr;

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    MongoDB,
    Memory,
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(DatabaseType::MongoDB),
            "memory" | "mem" => Ok(DatabaseType::Memory),
            _ => Err(format!("Unknown database type: {}", s)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Storage backend (default: mongodb)
    #[serde(default)]
    pub database_type: DatabaseType,

    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database URL (default: mongodb://localhost:27017)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Database name (default: marginalia)
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// CORS allowed origins (comma-separated). If empty, any origin is allowed.
    pub cors_allowed_origins: Option<String>,

    /// Upload limits and blob bucket
    #[serde(default)]
    pub library: LibraryConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "marginalia".to_string()
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", name, raw, e)),
        _ => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = LibraryConfig::default();

        let database_type = env_parsed::<DatabaseType>("DATABASE_TYPE")?.unwrap_or_default();
        let host = std::env::var("MARGINALIA_HOST").unwrap_or_else(|_| default_host());
        let port = env_parsed("MARGINALIA_PORT")?.unwrap_or_else(default_port);
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("MONGO_URI"))
            .unwrap_or_else(|_| default_database_url());
        let database_name =
            std::env::var("DATABASE_NAME").unwrap_or_else(|_| default_database_name());
        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS").ok();

        let library = LibraryConfig {
            max_file_size: env_parsed("MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_file_size),
            max_batch_files: env_parsed("MAX_BULK_FILES")?.unwrap_or(defaults.max_batch_files),
            blob_bucket: std::env::var("BLOB_BUCKET").unwrap_or(defaults.blob_bucket),
        };

        Ok(Self {
            database_type,
            host,
            port,
            database_url,
            database_name,
            cors_allowed_origins,
            library,
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Parsed CORS origins; empty means any origin
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_type: DatabaseType::default(),
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            database_name: default_database_name(),
            cors_allowed_origins: None,
            library: LibraryConfig::default(),
        }
    }
}
