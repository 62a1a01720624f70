//! Label-scoped full-text indexing over an entity graph
//!
//! Entities carry labels and properties. For every label an entity carries,
//! [`Indexer::index`] writes the requested properties into that label's
//! full-text index; [`QueryEngine::search`] queries one label's index and
//! yields the ids of matching entities.
//!
//! ## Architecture
//!
//! The crate owns no storage. It talks to two collaborators through traits
//! (see [`store`]):
//!
//! - **EntityStore**: reads labels and properties
//! - **IndexStore**: named full-text indexes; owns the query grammar
//!
//! `lantern-sqlite` implements both on SQLite/FTS5.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lantern_core::{EntityId, FullTextIndex};
//!
//! let index = FullTextIndex::new(entities, index_store, &config.indexing);
//! index.index(EntityId(42), &["name"])?;
//!
//! for hit in index.search("User", "name:Brook*")? {
//!     println!("{}", hit?.entity_id);
//! }
//! ```

pub mod entity;
pub mod error;
pub mod functions;
pub mod indexer;
pub mod namespace;
pub mod query;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

// Re-exports
pub use entity::{Entity, EntityId, Properties, PropertyValue};
pub use error::{IndexError, IndexResult};
pub use indexer::Indexer;
pub use namespace::{resolve, Namespace};
pub use query::{QueryEngine, SearchHit, SearchHits};
pub use service::FullTextIndex;
pub use store::{
    EntityStore, IndexConfig, IndexKind, IndexProvider, IndexStore, IndexWriter, RawHit, RawHits,
    WriteMode,
};

pub use lantern_config::IsolationLevel;
