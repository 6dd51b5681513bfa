//! Persistence layer: JSON document collections behind `DocumentStore`.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod records;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use records::{RequestId, RequestIdGenerator};
pub use traits::{Collection, DocumentStore};

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::DatabaseError;

/// Open the configured store: libSQL when a database location is set,
/// otherwise process memory.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
    match config.database_file() {
        Some(path) => Ok(Arc::new(LibSqlStore::new_local(&path).await?)),
        None => {
            tracing::warn!("No database configured, records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_store_falls_back_to_memory() {
        let store = open_store(&StoreConfig::default()).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn open_store_uses_libsql_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_url: Some(dir.path().to_path_buf()),
            db_name: "test".to_string(),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "libsql");
        assert!(dir.path().join("test.db").exists());
    }
}
