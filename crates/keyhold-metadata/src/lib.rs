//! Configuration storage for Keyhold
//!
//! Supports a SQLite backend and a non-persistent in-memory backend.

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryConfigStore;
pub use sqlite::SqliteConfigStore;
pub use traits::*;

use keyhold_core::config::DatabaseConfig;
use keyhold_core::Result;
use std::sync::Arc;
use tracing::info;

/// Open the store selected by the database configuration
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn ConfigStore>> {
    if config.is_memory() {
        info!("Using in-memory config store; configuration is lost on restart");
        return Ok(Arc::new(MemoryConfigStore::new()));
    }

    let store = SqliteConfigStore::new(&config.url, config.max_connections).await?;
    Ok(Arc::new(store))
}
