//! Store Traits
//!
//! The indexer and the query engine depend on two collaborators they do not
//! own:
//!
//! - **EntityStore**: read access to an entity's labels and properties
//! - **IndexStore**: named full-text indexes with existence checks,
//!   transactional mutation and query execution
//!
//! The query grammar belongs to the index store. Query strings pass through
//! this crate untouched.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use lantern_core::store::{IndexStore, WriteMode};
//!
//! fn clear_entity<I: IndexStore>(store: &I, ns: &Namespace, id: EntityId) -> IndexResult<()> {
//!     store.write(WriteMode::Transactional, &mut |writer| {
//!         writer.remove_from_index(ns, id)
//!     })
//! }
//! ```

use crate::entity::{EntityId, Properties, PropertyValue};
use crate::error::IndexResult;
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Entity Store
// ============================================================================

/// Read access to entities
pub trait EntityStore: Send + Sync {
    /// Properties of the entity restricted to `keys`, in one bulk read
    ///
    /// Keys the entity does not define are omitted from the result.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::EntityNotFound` if the entity does not exist
    fn get_properties(&self, entity_id: EntityId, keys: &[String]) -> IndexResult<Properties>;

    /// Current label set of the entity
    ///
    /// # Errors
    ///
    /// Returns `IndexError::EntityNotFound` if the entity does not exist
    fn get_labels(&self, entity_id: EntityId) -> IndexResult<BTreeSet<String>>;
}

impl<T: EntityStore + ?Sized> EntityStore for Arc<T> {
    fn get_properties(&self, entity_id: EntityId, keys: &[String]) -> IndexResult<Properties> {
        (**self).get_properties(entity_id, keys)
    }

    fn get_labels(&self, entity_id: EntityId) -> IndexResult<BTreeSet<String>> {
        (**self).get_labels(entity_id)
    }
}

// ============================================================================
// Index configuration
// ============================================================================

/// Engine providing an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexProvider {
    /// Tokenizing, relevance-ranked text engine
    FulltextEngine,
}

/// Lookup semantics of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Tokenized text search
    Fulltext,
    /// Exact value lookup
    Exact,
}

/// Typed index configuration, recorded by the store when an index is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexConfig {
    pub provider: IndexProvider,
    #[serde(rename = "type")]
    pub kind: IndexKind,
}

impl IndexConfig {
    /// Configuration used for every label index written by the indexer
    pub const FULL_TEXT: IndexConfig = IndexConfig {
        provider: IndexProvider::FulltextEngine,
        kind: IndexKind::Fulltext,
    };

    /// `{provider: "fulltext-engine", type: "fulltext"}`
    pub fn full_text() -> Self {
        Self::FULL_TEXT
    }

    /// Provider name as persisted
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            IndexProvider::FulltextEngine => "fulltext-engine",
        }
    }

    /// Index type name as persisted
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            IndexKind::Fulltext => "fulltext",
            IndexKind::Exact => "exact",
        }
    }

    /// Rebuild a configuration from its persisted names
    pub fn from_names(provider: &str, kind: &str) -> Option<Self> {
        let provider = match provider {
            "fulltext-engine" => IndexProvider::FulltextEngine,
            _ => return None,
        };
        let kind = match kind {
            "fulltext" => IndexKind::Fulltext,
            "exact" => IndexKind::Exact,
            _ => return None,
        };
        Some(Self { provider, kind })
    }
}

impl fmt::Display for IndexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{provider: \"{}\", type: \"{}\"}}",
            self.provider_name(),
            self.kind_name()
        )
    }
}

// ============================================================================
// Index Store
// ============================================================================

/// How a batch of index mutations is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// All operations commit together or not at all
    Transactional,
    /// Each operation commits on its own
    AutoCommit,
}

/// A single match returned by the index store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHit {
    pub entity_id: EntityId,
    pub score: f64,
}

/// Lazily evaluated query results
pub type RawHits<'a> = Box<dyn Iterator<Item = IndexResult<RawHit>> + Send + 'a>;

/// Mutation capability handed out by [`IndexStore::write`]
pub trait IndexWriter {
    /// Create the index if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns `IndexError::IndexConfigMismatch` if the namespace already holds
    /// an index with a different configuration
    fn ensure_index(&mut self, namespace: &Namespace, config: &IndexConfig) -> IndexResult<()>;

    /// Remove every record of the entity from the index; a no-op if there are none
    fn remove_from_index(&mut self, namespace: &Namespace, entity_id: EntityId) -> IndexResult<()>;

    /// Add one (key, value) record for the entity
    fn add_to_index(
        &mut self,
        namespace: &Namespace,
        entity_id: EntityId,
        key: &str,
        value: &PropertyValue,
    ) -> IndexResult<()>;
}

/// Named full-text indexes
pub trait IndexStore: Send + Sync {
    /// Whether an index exists under the namespace
    fn exists_index(&self, namespace: &Namespace) -> IndexResult<bool>;

    /// Run `ops` against the store, committing according to `mode`
    ///
    /// With [`WriteMode::Transactional`] an error returned by `ops` rolls back
    /// everything it did.
    fn write(
        &self,
        mode: WriteMode,
        ops: &mut dyn FnMut(&mut dyn IndexWriter) -> IndexResult<()>,
    ) -> IndexResult<()>;

    /// Execute a query in the store's own grammar
    ///
    /// # Errors
    ///
    /// Returns `IndexError::MalformedQuery` if the grammar rejects `query`
    fn query(&self, namespace: &Namespace, query: &str) -> IndexResult<RawHits<'_>>;
}

impl<T: IndexStore + ?Sized> IndexStore for Arc<T> {
    fn exists_index(&self, namespace: &Namespace) -> IndexResult<bool> {
        (**self).exists_index(namespace)
    }

    fn write(
        &self,
        mode: WriteMode,
        ops: &mut dyn FnMut(&mut dyn IndexWriter) -> IndexResult<()>,
    ) -> IndexResult<()> {
        (**self).write(mode, ops)
    }

    fn query(&self, namespace: &Namespace, query: &str) -> IndexResult<RawHits<'_>> {
        (**self).query(namespace, query)
    }
}
