//! Full-text index facade
//!
//! Exposes the two caller-facing operations, `index` and `search`, over a
//! shared pair of store handles.

use crate::entity::EntityId;
use crate::error::IndexResult;
use crate::indexer::Indexer;
use crate::query::{QueryEngine, SearchHits};
use crate::store::{EntityStore, IndexStore};
use lantern_config::IndexingConfig;
use std::sync::Arc;

/// Label-scoped full-text indexing and search
pub struct FullTextIndex<E, I> {
    indexer: Indexer<E, I>,
    engine: QueryEngine<I>,
}

impl<E, I> Clone for FullTextIndex<E, I> {
    fn clone(&self) -> Self {
        Self {
            indexer: self.indexer.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<E: EntityStore, I: IndexStore> FullTextIndex<E, I> {
    /// Build the facade from store handles and indexing settings
    pub fn new(entities: Arc<E>, index: Arc<I>, config: &IndexingConfig) -> Self {
        Self {
            indexer: Indexer::new(entities, Arc::clone(&index), config.isolation),
            engine: QueryEngine::new(index),
        }
    }

    /// Index the given properties of an entity under each of its labels
    pub fn index<S: AsRef<str>>(
        &self,
        entity_id: EntityId,
        property_keys: &[S],
    ) -> IndexResult<()> {
        self.indexer.index(entity_id, property_keys)
    }

    /// Query the index of a label
    pub fn search(&self, label: &str, query: &str) -> IndexResult<SearchHits<'_>> {
        self.engine.search(label, query)
    }

    /// The underlying indexer
    pub fn indexer(&self) -> &Indexer<E, I> {
        &self.indexer
    }

    /// The underlying query engine
    pub fn query_engine(&self) -> &QueryEngine<I> {
        &self.engine
    }
}
