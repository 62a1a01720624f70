//! Wiring of both stores over one database

use crate::config::SqliteConfig;
use crate::connection::SqlitePool;
use crate::eav::SqliteEntityStore;
use crate::error::{SqliteError, SqliteResult};
use crate::fulltext::SqliteIndexStore;
use lantern_config::{IndexingConfig, LanternConfig};
use lantern_core::FullTextIndex;
use std::sync::Arc;
use tracing::info;

/// Full-text index backed by SQLite
pub type SqliteFullTextIndex = FullTextIndex<SqliteEntityStore, SqliteIndexStore>;

/// Entity and index stores sharing one connection pool
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    entities: Arc<SqliteEntityStore>,
    index: Arc<SqliteIndexStore>,
}

impl SqliteBackend {
    /// Open the database described by `config.storage`
    pub fn open(config: &LanternConfig) -> SqliteResult<Self> {
        config
            .validate()
            .map_err(|e| SqliteError::InvalidOperation(e.to_string()))?;

        let pool = SqlitePool::new(SqliteConfig::from(&config.storage))?;
        Ok(Self::with_pool(pool, &config.indexing))
    }

    /// In-memory database with default indexing settings
    pub fn memory() -> SqliteResult<Self> {
        Self::open(&LanternConfig::in_memory())
    }

    /// Build both stores over an existing pool
    pub fn with_pool(pool: SqlitePool, indexing: &IndexingConfig) -> Self {
        info!(
            path = ?pool.config().path,
            isolation = %indexing.isolation,
            page_size = indexing.search_page_size,
            "Creating SQLite full-text backend"
        );

        let index =
            SqliteIndexStore::new(pool.clone()).with_page_size(indexing.search_page_size);

        Self {
            entities: Arc::new(SqliteEntityStore::new(pool.clone())),
            index: Arc::new(index),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn entities(&self) -> &Arc<SqliteEntityStore> {
        &self.entities
    }

    pub fn index_store(&self) -> &Arc<SqliteIndexStore> {
        &self.index
    }

    /// Indexer and query engine over this backend's stores
    pub fn full_text_index(&self, indexing: &IndexingConfig) -> SqliteFullTextIndex {
        FullTextIndex::new(Arc::clone(&self.entities), Arc::clone(&self.index), indexing)
    }
}

/// Open a database and return its full-text index
///
/// Convenience for callers that only need `index` and `search`; use
/// [`SqliteBackend`] to also populate entities.
pub fn create_full_text_index(config: &LanternConfig) -> SqliteResult<SqliteFullTextIndex> {
    Ok(SqliteBackend::open(config)?.full_text_index(&config.indexing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_config::IsolationLevel;

    #[test]
    fn test_open_rejects_invalid_config() {
        let mut config = LanternConfig::in_memory();
        config.indexing.search_page_size = 0;

        let err = SqliteBackend::open(&config).err().expect("open should fail");
        assert!(matches!(err, SqliteError::InvalidOperation(_)));
    }

    #[test]
    fn test_stores_share_the_pool() {
        let mut config = LanternConfig::in_memory();
        config.indexing.search_page_size = 8;
        config.indexing.isolation = IsolationLevel::PerEntity;

        let backend = SqliteBackend::open(&config).unwrap();
        assert_eq!(backend.index_store().page_size(), 8);

        let index = backend.full_text_index(&config.indexing);
        assert_eq!(index.indexer().isolation(), IsolationLevel::PerEntity);
    }
}
