//! Query Engine
//!
//! Searches the full-text index of a single label. A label that has never
//! been indexed has no index; searching it yields nothing and is not an error.

use crate::entity::EntityId;
use crate::error::IndexResult;
use crate::namespace;
use crate::store::{IndexStore, RawHits};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A matching entity
///
/// Serializes as `{"entityId": <id>}`; no other fields are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub entity_id: EntityId,
}

/// Lazy sequence of search hits
///
/// Hits are pulled from the index store as the iterator advances, so taking a
/// prefix never evaluates the remainder.
pub struct SearchHits<'a> {
    inner: Option<RawHits<'a>>,
}

impl<'a> SearchHits<'a> {
    /// A sequence that yields nothing
    pub fn empty() -> Self {
        Self { inner: None }
    }

    fn from_raw(raw: RawHits<'a>) -> Self {
        Self { inner: Some(raw) }
    }

    /// Collect every hit, stopping at the first error
    pub fn into_vec(self) -> IndexResult<Vec<SearchHit>> {
        self.collect()
    }

    /// Collect the entity ids of every hit, stopping at the first error
    pub fn entity_ids(self) -> IndexResult<Vec<EntityId>> {
        self.map(|hit| hit.map(|h| h.entity_id)).collect()
    }
}

impl Iterator for SearchHits<'_> {
    type Item = IndexResult<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.inner.as_mut()?.next()?;
        Some(raw.map(|hit| SearchHit {
            entity_id: hit.entity_id,
        }))
    }
}

impl fmt::Debug for SearchHits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchHits")
            .field("empty", &self.inner.is_none())
            .finish()
    }
}

/// Runs label-scoped queries against the index store
pub struct QueryEngine<I> {
    index: Arc<I>,
}

impl<I> Clone for QueryEngine<I> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
        }
    }
}

impl<I: IndexStore> QueryEngine<I> {
    /// Create a query engine over the given index store
    pub fn new(index: Arc<I>) -> Self {
        Self { index }
    }

    /// Search the index of `label` with `query`, passed verbatim to the store
    ///
    /// # Errors
    ///
    /// - `IndexError::MalformedQuery` if the store rejects the query
    /// - `IndexError::IndexUnavailable` if the store cannot be read
    pub fn search(&self, label: &str, query: &str) -> IndexResult<SearchHits<'_>> {
        let namespace = namespace::resolve(label);

        // Never create an index just to find nothing in it
        if !self.index.exists_index(&namespace)? {
            debug!(%namespace, "Skipping index query since index does not exist");
            return Ok(SearchHits::empty());
        }

        let raw = self.index.query(&namespace, query)?;
        Ok(SearchHits::from_raw(raw))
    }
}
