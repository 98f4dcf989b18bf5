pub mod cache;
pub mod memory;
pub mod models;
pub mod repository;

use std::sync::Arc;

use memory::MemoryStore;
use repository::{KeyValueStore, SqliteStore, StorageError};

/// Database URL that selects the in-process store instead of SQLite.
pub const MEMORY_STORE_URL: &str = "memory";

pub async fn open_store(database_url: &str) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    if database_url.trim() == MEMORY_STORE_URL {
        tracing::info!("using in-memory cache store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(database_url).await?;
    tracing::info!(database_url, "sqlite cache store ready");
    Ok(Arc::new(store))
}
