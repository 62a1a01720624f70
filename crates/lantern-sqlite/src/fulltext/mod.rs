//! IndexStore implementation on SQLite FTS5
//!
//! Queries are handed to FTS5 verbatim, so the grammar is FTS5's:
//! `name:Brook*` (column filter with prefix), `"exact phrase"`,
//! `a AND b`, `a OR b`, `NOT`, `NEAR(...)`.

mod registry;
mod search;

pub use registry::IndexInfo;

use crate::connection::SqlitePool;
use crate::error::IndexContext;
use lantern_config::IndexingConfig;
use lantern_core::{
    EntityId, IndexConfig, IndexError, IndexKind, IndexResult, IndexStore, IndexWriter, Namespace,
    PropertyValue, RawHits, WriteMode,
};
use rusqlite::Connection;
use search::SqliteHits;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// SQLite/FTS5 implementation of IndexStore
#[derive(Clone)]
pub struct SqliteIndexStore {
    pool: SqlitePool,
    page_size: usize,
    pages_fetched: Arc<AtomicUsize>,
}

impl SqliteIndexStore {
    /// Create a new IndexStore with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            page_size: IndexingConfig::default().search_page_size,
            pages_fetched: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of hits fetched per round trip while a result set is consumed
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Result pages read from SQLite since the store was created
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    /// All registered indexes, ordered by namespace
    pub fn indexes(&self) -> IndexResult<Vec<IndexInfo>> {
        self.pool
            .with_connection(registry::list)
            .index_context(|| "list indexes".to_string())
    }

    /// Registration details of one index
    pub fn index_info(&self, namespace: &Namespace) -> IndexResult<Option<IndexInfo>> {
        self.pool
            .with_connection(|conn| registry::lookup(conn, namespace.as_str()))
            .index_context(|| format!("look up index `{}`", namespace))
    }

    /// Drop an index and all of its records
    ///
    /// Returns false if no index existed under the namespace.
    pub fn drop_index(&self, namespace: &Namespace) -> IndexResult<bool> {
        self.pool
            .with_connection_mut(|conn| {
                let tx = conn.transaction()?;
                let Some(info) = registry::lookup(&tx, namespace.as_str())? else {
                    return Ok(false);
                };
                registry::drop_index(&tx, &info)?;
                tx.commit()?;
                Ok(true)
            })
            .index_context(|| format!("drop index `{}`", namespace))
    }

    /// Text currently indexed for one property of an entity
    pub fn indexed_text(
        &self,
        namespace: &Namespace,
        key: &str,
        entity_id: EntityId,
    ) -> IndexResult<Option<String>> {
        self.pool
            .with_connection(|conn| {
                let Some(info) = registry::lookup(conn, namespace.as_str())? else {
                    return Ok(None);
                };
                if !info.columns.iter().any(|c| c == key) {
                    return Ok(None);
                }
                registry::stored_value(conn, &info, key, entity_id)
            })
            .index_context(|| format!("read `{}` of entity {} in `{}`", key, entity_id, namespace))
    }
}

impl IndexStore for SqliteIndexStore {
    fn exists_index(&self, namespace: &Namespace) -> IndexResult<bool> {
        Ok(self.index_info(namespace)?.is_some())
    }

    fn write(
        &self,
        mode: WriteMode,
        ops: &mut dyn FnMut(&mut dyn IndexWriter) -> IndexResult<()>,
    ) -> IndexResult<()> {
        match mode {
            WriteMode::Transactional => {
                let mut conn = self.pool.lock();
                let tx = conn
                    .transaction()
                    .index_context(|| "begin index transaction".to_string())?;

                // An error from `ops` drops `tx`, which rolls back
                ops(&mut SqliteIndexWriter::new(Target::Transaction(&tx)))?;

                tx.commit()
                    .index_context(|| "commit index transaction".to_string())?;
                trace!("Committed index transaction");
            }
            WriteMode::AutoCommit => {
                ops(&mut SqliteIndexWriter::new(Target::Pool(&self.pool)))?;
            }
        }
        Ok(())
    }

    fn query(&self, namespace: &Namespace, query: &str) -> IndexResult<RawHits<'_>> {
        if query.trim().is_empty() {
            return Err(IndexError::malformed_query(
                namespace.as_str(),
                query,
                "query is empty",
            ));
        }

        let Some(info) = self.index_info(namespace)? else {
            return Ok(Box::new(std::iter::empty()));
        };

        debug!(
            namespace = %namespace,
            query,
            page_size = self.page_size,
            "Running full-text query"
        );
        let hits = SqliteHits::open(
            self.pool.clone(),
            &info.namespace,
            &info.table_name,
            query,
            self.page_size,
            Arc::clone(&self.pages_fetched),
        )?;
        Ok(Box::new(hits))
    }
}

/// Where writer operations execute
#[derive(Clone, Copy)]
enum Target<'a> {
    /// Inside a transaction owned by [`IndexStore::write`]
    Transaction(&'a Connection),
    /// Each operation locks the pool and commits on its own
    Pool(&'a SqlitePool),
}

struct SqliteIndexWriter<'a> {
    target: Target<'a>,
}

impl<'a> SqliteIndexWriter<'a> {
    fn new(target: Target<'a>) -> Self {
        Self { target }
    }

    fn run<T>(&self, f: impl FnOnce(&Connection) -> IndexResult<T>) -> IndexResult<T> {
        match self.target {
            Target::Transaction(conn) => f(conn),
            Target::Pool(pool) => {
                let conn = pool.lock();
                let tx = conn
                    .unchecked_transaction()
                    .index_context(|| "begin index write".to_string())?;
                let out = f(&*tx)?;
                tx.commit().index_context(|| "commit index write".to_string())?;
                Ok(out)
            }
        }
    }
}

fn lookup_existing(conn: &Connection, namespace: &Namespace) -> IndexResult<registry::IndexInfo> {
    registry::lookup(conn, namespace.as_str())
        .index_context(|| format!("look up index `{}`", namespace))?
        .ok_or_else(|| {
            IndexError::unavailable(format!("write index `{}`", namespace), "index does not exist")
        })
}

impl IndexWriter for SqliteIndexWriter<'_> {
    fn ensure_index(&mut self, namespace: &Namespace, config: &IndexConfig) -> IndexResult<()> {
        self.run(|conn| {
            let existing = registry::lookup(conn, namespace.as_str())
                .index_context(|| format!("look up index `{}`", namespace))?;

            match existing {
                Some(info) if info.config == *config => Ok(()),
                Some(info) => Err(IndexError::IndexConfigMismatch {
                    namespace: namespace.to_string(),
                    stored: info.config.to_string(),
                    requested: config.to_string(),
                }),
                None if config.kind != IndexKind::Fulltext => Err(IndexError::unavailable(
                    format!("create index `{}`", namespace),
                    format!("unsupported index configuration {}", config),
                )),
                None => registry::create(conn, namespace, config)
                    .map(|_| ())
                    .index_context(|| format!("create index `{}`", namespace)),
            }
        })
    }

    fn remove_from_index(&mut self, namespace: &Namespace, entity_id: EntityId) -> IndexResult<()> {
        self.run(|conn| {
            let Some(info) = registry::lookup(conn, namespace.as_str())
                .index_context(|| format!("look up index `{}`", namespace))?
            else {
                return Ok(());
            };

            let removed = registry::remove_entity(conn, &info, entity_id)
                .index_context(|| format!("remove entity {} from `{}`", entity_id, namespace))?;
            trace!(
                namespace = %namespace,
                entity_id = %entity_id,
                removed,
                "Removed index records"
            );
            Ok(())
        })
    }

    fn add_to_index(
        &mut self,
        namespace: &Namespace,
        entity_id: EntityId,
        key: &str,
        value: &PropertyValue,
    ) -> IndexResult<()> {
        self.run(|conn| {
            let mut info = lookup_existing(conn, namespace)?;
            let column = registry::ensure_column(conn, &mut info, key)?;
            registry::append_value(conn, &info, &column, entity_id, &value.index_text())
                .index_context(|| {
                    format!("add `{}` of entity {} to `{}`", key, entity_id, namespace)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::resolve;

    fn store() -> SqliteIndexStore {
        SqliteIndexStore::new(SqlitePool::memory().unwrap())
    }

    fn add(store: &SqliteIndexStore, label: &str, id: i64, key: &str, value: &str) {
        let ns = resolve(label);
        store
            .write(WriteMode::Transactional, &mut |w| {
                w.ensure_index(&ns, &IndexConfig::FULL_TEXT)?;
                w.add_to_index(&ns, EntityId(id), key, &PropertyValue::from(value))
            })
            .unwrap();
    }

    fn ids(store: &SqliteIndexStore, label: &str, query: &str) -> Vec<i64> {
        store
            .query(&resolve(label), query)
            .unwrap()
            .map(|hit| hit.unwrap().entity_id.get())
            .collect()
    }

    #[test]
    fn test_ensure_index_creates_once() {
        let store = store();
        let ns = resolve("User");
        assert!(!store.exists_index(&ns).unwrap());

        for _ in 0..2 {
            store
                .write(WriteMode::Transactional, &mut |w| {
                    w.ensure_index(&ns, &IndexConfig::FULL_TEXT)
                })
                .unwrap();
        }

        assert!(store.exists_index(&ns).unwrap());
        assert_eq!(store.indexes().unwrap().len(), 1);
    }

    #[test]
    fn test_ensure_index_rejects_other_configuration() {
        let store = store();
        add(&store, "User", 1, "name", "Ann");

        let exact = IndexConfig {
            kind: IndexKind::Exact,
            ..IndexConfig::FULL_TEXT
        };
        let err = store
            .write(WriteMode::Transactional, &mut |w| {
                w.ensure_index(&resolve("User"), &exact)
            })
            .unwrap_err();
        assert!(matches!(err, IndexError::IndexConfigMismatch { .. }));
    }

    #[test]
    fn test_prefix_query_with_column_filter() {
        let store = store();
        add(&store, "User", 1, "name", "Brookreson");
        add(&store, "User", 2, "name", "Smith");

        assert_eq!(ids(&store, "User", "name:Brook*"), vec![1]);
        assert_eq!(ids(&store, "User", "brookreson"), vec![1]);
    }

    #[test]
    fn test_query_missing_index_is_empty() {
        let store = store();
        assert!(ids(&store, "Nobody", "name:x*").is_empty());
    }

    #[test]
    fn test_unknown_column_matches_nothing() {
        let store = store();
        add(&store, "User", 1, "name", "Brookreson");
        add(&store, "User", 2, "name", "Smith");

        assert!(ids(&store, "User", "ghost:Brook*").is_empty());
        assert_eq!(ids(&store, "User", "name:Brook* OR ghost:x"), vec![1]);
        assert_eq!(ids(&store, "User", "ghost:x OR name:Brook*"), vec![1]);
        assert_eq!(ids(&store, "User", "ghost:x OR spook:y OR name:Smith"), vec![2]);
        assert!(ids(&store, "User", "name:Brook* AND ghost:x").is_empty());

        // the empty columns only exist for the duration of the query
        let info = store.index_info(&resolve("User")).unwrap().unwrap();
        assert_eq!(info.columns, vec!["name"]);
        assert_eq!(
            store.indexed_text(&resolve("User"), "name", EntityId(1)).unwrap().as_deref(),
            Some("Brookreson")
        );
    }

    #[test]
    fn test_unknown_column_does_not_hide_syntax_errors() {
        let store = store();
        add(&store, "User", 1, "name", "Brookreson");

        let err = store.query(&resolve("User"), "ghost:(").err();
        assert!(
            matches!(err, Some(IndexError::MalformedQuery { .. })),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_unknown_column_on_later_pages() {
        let store = store().with_page_size(2);
        for id in 1..=5 {
            add(&store, "User", id, "name", "Ann");
        }

        let hits: Vec<_> = store
            .query(&resolve("User"), "name:Ann OR ghost:x")
            .unwrap()
            .collect::<IndexResult<Vec<_>>>()
            .unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(store.pages_fetched(), 3);
    }

    #[test]
    fn test_key_differing_only_in_case_rolls_back() {
        let store = store();
        add(&store, "User", 1, "Name", "Alice");

        let ns = resolve("User");
        let err = store
            .write(WriteMode::Transactional, &mut |w| {
                w.remove_from_index(&ns, EntityId(2))?;
                w.add_to_index(&ns, EntityId(2), "Name", &PropertyValue::from("Carol"))?;
                w.add_to_index(&ns, EntityId(2), "name", &PropertyValue::from("Bob"))
            })
            .unwrap_err();

        assert!(matches!(err, IndexError::InvalidProperty { .. }));
        assert_eq!(store.indexed_text(&ns, "Name", EntityId(2)).unwrap(), None);
        assert_eq!(ids(&store, "User", "Name:Carol"), Vec::<i64>::new());
    }

    #[test]
    fn test_malformed_queries() {
        let store = store();
        add(&store, "User", 1, "name", "Brookreson");

        for query in ["", "   ", "name:(Brook", "\"unterminated"] {
            let err = store.query(&resolve("User"), query).err();
            assert!(
                matches!(err, Some(IndexError::MalformedQuery { .. })),
                "query {:?} gave {:?}",
                query,
                err
            );
        }
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = store();
        let ns = resolve("User");

        let err = store
            .write(WriteMode::Transactional, &mut |w| {
                w.ensure_index(&ns, &IndexConfig::FULL_TEXT)?;
                w.add_to_index(&ns, EntityId(1), "name", &PropertyValue::from("Ann"))?;
                w.add_to_index(&ns, EntityId(1), "rank", &PropertyValue::from("first"))
            })
            .unwrap_err();

        assert!(matches!(err, IndexError::InvalidProperty { .. }));
        assert!(!store.exists_index(&ns).unwrap());
    }

    #[test]
    fn test_auto_commit_keeps_completed_operations() {
        let store = store();
        let ns = resolve("User");

        let result = store.write(WriteMode::AutoCommit, &mut |w| {
            w.ensure_index(&ns, &IndexConfig::FULL_TEXT)?;
            w.add_to_index(&ns, EntityId(1), "name", &PropertyValue::from("Ann"))?;
            w.add_to_index(&ns, EntityId(1), "rank", &PropertyValue::from("first"))
        });

        assert!(result.is_err());
        assert_eq!(ids(&store, "User", "name:Ann"), vec![1]);
    }

    #[test]
    fn test_remove_from_index() {
        let store = store();
        add(&store, "User", 1, "name", "Ann");
        add(&store, "User", 2, "name", "Ann");

        store
            .write(WriteMode::Transactional, &mut |w| {
                w.remove_from_index(&resolve("User"), EntityId(1))?;
                // removing from a namespace that was never created is a no-op
                w.remove_from_index(&resolve("Ghost"), EntityId(1))
            })
            .unwrap();

        assert_eq!(ids(&store, "User", "name:Ann"), vec![2]);
        assert_eq!(store.indexed_text(&resolve("User"), "name", EntityId(1)).unwrap(), None);
    }

    #[test]
    fn test_drop_index() {
        let store = store();
        add(&store, "User", 1, "name", "Ann");

        assert!(store.drop_index(&resolve("User")).unwrap());
        assert!(!store.drop_index(&resolve("User")).unwrap());
        assert!(!store.exists_index(&resolve("User")).unwrap());
        assert!(ids(&store, "User", "Ann").is_empty());
    }

    #[test]
    fn test_pages_are_fetched_on_demand() {
        let store = store().with_page_size(2);
        for id in 1..=5 {
            add(&store, "User", id, "name", "Ann");
        }

        let mut hits = store.query(&resolve("User"), "name:Ann").unwrap();
        assert_eq!(store.pages_fetched(), 1);
        assert!(hits.next().is_some());
        assert_eq!(store.pages_fetched(), 1);

        let rest: Vec<_> = hits.collect::<IndexResult<Vec<_>>>().unwrap();
        assert_eq!(rest.len(), 4);
        assert_eq!(store.pages_fetched(), 3);
    }

    #[test]
    fn test_equal_scores_order_by_id() {
        let store = store();
        for id in [7, 3, 5] {
            add(&store, "Tag", id, "name", "rust");
        }
        assert_eq!(ids(&store, "Tag", "name:rust"), vec![3, 5, 7]);
    }
}
