pub mod mongo;
pub mod sqlite;
pub mod trait_def;

pub use mongo::MongoStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use crate::config::{DatabaseBackend, DatabaseConfig};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Open the configured backend and prepare it for use.
pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Mongodb => {
            info!("Using MongoDB storage: {}/{}", config.name, config.collection);
            Arc::new(MongoStorage::connect(&config.url, &config.name, &config.collection).await?)
        }
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(SqliteStorage::new(&config.url, config.max_connections).await?)
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    Ok(storage)
}
