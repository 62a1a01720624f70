//! SQLite storage backend for Lantern
//!
//! Implements `lantern-core`'s store traits on a single SQLite database:
//!
//! - **SqliteEntityStore**: entities, labels and JSON-encoded properties
//! - **SqliteIndexStore**: one FTS5 table per index namespace, one column
//!   per indexed property key, rowid = entity id
//!
//! Both share a [`SqlitePool`], an `Arc<Mutex<Connection>>` with WAL mode
//! enabled for file-backed databases.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lantern_config::LanternConfig;
//! use lantern_sqlite::SqliteBackend;
//!
//! let config = LanternConfig::in_memory();
//! let backend = SqliteBackend::open(&config)?;
//! let id = backend.entities().create_entity(&["User"], &props)?;
//!
//! let index = backend.full_text_index(&config.indexing);
//! index.index(id, &["name"])?;
//! let hits = index.search("User", "name:Brook*")?.entity_ids()?;
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod eav;
pub mod error;
pub mod fulltext;
pub mod schema;

// Re-exports
pub use backend::{create_full_text_index, SqliteBackend, SqliteFullTextIndex};
pub use config::SqliteConfig;
pub use connection::{DbStats, SqlitePool};
pub use eav::SqliteEntityStore;
pub use error::{SqliteError, SqliteResult};
pub use fulltext::{IndexInfo, SqliteIndexStore};
