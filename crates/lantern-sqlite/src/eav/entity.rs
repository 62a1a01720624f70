//! EntityStore implementation for SQLite

use super::{label, property};
use crate::connection::SqlitePool;
use crate::error::{IndexContext, SqliteError, SqliteResult};
use lantern_core::{Entity, EntityId, EntityStore, IndexResult, Properties};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::debug;

/// SQLite implementation of EntityStore
///
/// Besides the read contract the indexer needs, this type carries the
/// mutations used to populate the graph.
#[derive(Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Create a new EntityStore with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create an entity with a fresh id
    pub fn create_entity<S: AsRef<str>>(
        &self,
        labels: &[S],
        properties: &Properties,
    ) -> SqliteResult<EntityId> {
        self.pool.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("INSERT INTO entities DEFAULT VALUES", [])?;
            let id = EntityId(tx.last_insert_rowid());

            for l in labels {
                label::insert_label(&tx, id, l.as_ref())?;
            }
            for (key, value) in properties {
                property::write_property(&tx, id, key, value)?;
            }
            tx.commit()?;

            debug!(
                entity_id = %id,
                labels = labels.len(),
                properties = properties.len(),
                "Created entity"
            );
            Ok(id)
        })
    }

    /// Store an entity under its own id, replacing any existing labels and properties
    pub fn insert_entity(&self, entity: &Entity) -> SqliteResult<()> {
        self.pool.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                r#"
                INSERT INTO entities (id) VALUES (?1)
                ON CONFLICT(id) DO UPDATE SET updated_at = datetime('now')
                "#,
                [entity.id.get()],
            )?;
            tx.execute("DELETE FROM entity_labels WHERE entity_id = ?1", [entity.id.get()])?;
            tx.execute("DELETE FROM entity_properties WHERE entity_id = ?1", [entity.id.get()])?;

            for l in &entity.labels {
                label::insert_label(&tx, entity.id, l)?;
            }
            for (key, value) in &entity.properties {
                property::write_property(&tx, entity.id, key, value)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Load an entity with all of its labels and properties
    pub fn get_entity(&self, id: EntityId) -> SqliteResult<Option<Entity>> {
        self.pool.with_connection(|conn| {
            if !exists(conn, id)? {
                return Ok(None);
            }

            Ok(Some(Entity {
                id,
                labels: label::load_labels(conn, id)?,
                properties: property::load_properties(conn, id, None)?,
            }))
        })
    }

    /// Delete an entity with its labels and properties
    ///
    /// Index records are left alone; they disappear the next time the
    /// namespace is rebuilt or dropped. Returns whether the entity existed.
    pub fn delete_entity(&self, id: EntityId) -> SqliteResult<bool> {
        self.pool.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM entity_labels WHERE entity_id = ?1", [id.get()])?;
            tx.execute("DELETE FROM entity_properties WHERE entity_id = ?1", [id.get()])?;
            let deleted = tx.execute("DELETE FROM entities WHERE id = ?1", [id.get()])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    /// Whether the entity exists
    pub fn entity_exists(&self, id: EntityId) -> SqliteResult<bool> {
        self.pool.with_connection(|conn| exists(conn, id))
    }
}

impl EntityStore for SqliteEntityStore {
    fn get_properties(&self, entity_id: EntityId, keys: &[String]) -> IndexResult<Properties> {
        self.pool
            .with_connection(|conn| {
                require(conn, entity_id)?;
                property::load_properties(conn, entity_id, Some(keys))
            })
            .index_context(|| format!("read properties of entity {}", entity_id))
    }

    fn get_labels(&self, entity_id: EntityId) -> IndexResult<BTreeSet<String>> {
        self.pool
            .with_connection(|conn| {
                require(conn, entity_id)?;
                label::load_labels(conn, entity_id)
            })
            .index_context(|| format!("read labels of entity {}", entity_id))
    }
}

pub(super) fn exists(conn: &Connection, id: EntityId) -> SqliteResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM entities WHERE id = ?1", [id.get()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub(super) fn require(conn: &Connection, id: EntityId) -> SqliteResult<()> {
    if exists(conn, id)? {
        Ok(())
    } else {
        Err(SqliteError::EntityNotFound(id))
    }
}

pub(super) fn touch(conn: &Connection, id: EntityId) -> SqliteResult<()> {
    conn.execute(
        "UPDATE entities SET updated_at = datetime('now') WHERE id = ?1",
        params![id.get()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::{IndexError, PropertyValue};

    fn store() -> SqliteEntityStore {
        SqliteEntityStore::new(SqlitePool::memory().unwrap())
    }

    #[test]
    fn test_create_and_get_entity() {
        let store = store();
        let mut props = Properties::new();
        props.insert("name".into(), PropertyValue::from("Brookreson"));
        props.insert("age".into(), PropertyValue::from(41_i64));

        let id = store.create_entity(&["User"], &props).unwrap();
        let entity = store.get_entity(id).unwrap().expect("entity should exist");

        assert_eq!(entity.id, id);
        assert!(entity.labels.contains("User"));
        assert_eq!(entity.properties, props);
    }

    #[test]
    fn test_insert_entity_replaces_previous_state() {
        let store = store();
        let first = Entity::new(5).with_label("User").with_property("name", "Ann");
        store.insert_entity(&first).unwrap();

        let second = Entity::new(5).with_label("Admin").with_property("email", "ann@example.com");
        store.insert_entity(&second).unwrap();

        let loaded = store.get_entity(EntityId(5)).unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_get_missing_entity() {
        let store = store();
        assert!(store.get_entity(EntityId(404)).unwrap().is_none());
        assert!(!store.entity_exists(EntityId(404)).unwrap());
    }

    #[test]
    fn test_delete_entity() {
        let store = store();
        let id = store.create_entity(&["User"], &Properties::new()).unwrap();

        assert!(store.delete_entity(id).unwrap());
        assert!(!store.delete_entity(id).unwrap());
        assert!(store.get_entity(id).unwrap().is_none());
    }

    #[test]
    fn test_get_properties_filters_keys() {
        let store = store();
        let entity = Entity::new(1)
            .with_label("User")
            .with_property("name", "Brookreson")
            .with_property("email", "b@example.com");
        store.insert_entity(&entity).unwrap();

        let props = store
            .get_properties(EntityId(1), &["name".to_string(), "ghost".to_string()])
            .unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["name"], PropertyValue::from("Brookreson"));

        let none = store.get_properties(EntityId(1), &[]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_reads_on_missing_entity_fail() {
        let store = store();
        let err = store.get_labels(EntityId(9)).unwrap_err();
        assert_eq!(err, IndexError::EntityNotFound { entity_id: EntityId(9) });

        let err = store
            .get_properties(EntityId(9), &["name".to_string()])
            .unwrap_err();
        assert_eq!(err, IndexError::EntityNotFound { entity_id: EntityId(9) });
    }

    #[test]
    fn test_entity_without_labels_reads_empty_set() {
        let store = store();
        let id = store.create_entity::<&str>(&[], &Properties::new()).unwrap();
        assert!(store.get_labels(id).unwrap().is_empty());
    }
}
