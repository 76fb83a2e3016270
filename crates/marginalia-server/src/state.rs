//! Storage backend selection

use anyhow::Result;
use marginalia::{MongoDb, Storage};

use crate::config::{Config, DatabaseType};

/// Storage backend chosen at startup
#[derive(Clone)]
pub enum DatabaseBackend {
    MongoDB(MongoDb),
    Memory,
}

impl DatabaseBackend {
    /// Connect to the configured backend
    pub async fn connect(config: &Config) -> Result<Self> {
        match config.database_type {
            DatabaseType::MongoDB => {
                tracing::info!("Connecting to MongoDB at {}", config.database_url);
                let db = MongoDb::connect(&config.database_url, &config.database_name).await?;
                Ok(DatabaseBackend::MongoDB(db))
            }
            DatabaseType::Memory => {
                tracing::warn!("Using in-memory storage; nothing survives a restart");
                Ok(DatabaseBackend::Memory)
            }
        }
    }

    /// Storage handles for the library services
    pub fn storage(&self, config: &Config) -> Storage {
        match self {
            DatabaseBackend::MongoDB(db) => Storage::mongo(db, &config.library.blob_bucket),
            DatabaseBackend::Memory => Storage::in_memory(),
        }
    }

    /// Whether the backend is reachable
    pub async fn is_healthy(&self) -> bool {
        match self {
            DatabaseBackend::MongoDB(db) => db.ping().await.is_ok(),
            DatabaseBackend::Memory => true,
        }
    }
}
