//! Label membership

use super::entity::{require, touch, SqliteEntityStore};
use crate::error::SqliteResult;
use lantern_core::EntityId;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

impl SqliteEntityStore {
    /// Attach a label; returns false if the entity already carried it
    pub fn add_label(&self, id: EntityId, label: &str) -> SqliteResult<bool> {
        self.pool().with_connection(|conn| {
            require(conn, id)?;
            let added = insert_label(conn, id, label)?;
            if added {
                touch(conn, id)?;
            }
            Ok(added)
        })
    }

    /// Detach a label; returns false if the entity did not carry it
    pub fn remove_label(&self, id: EntityId, label: &str) -> SqliteResult<bool> {
        self.pool().with_connection(|conn| {
            require(conn, id)?;
            let removed = conn.execute(
                "DELETE FROM entity_labels WHERE entity_id = ?1 AND label = ?2",
                params![id.get(), label],
            )?;
            if removed > 0 {
                touch(conn, id)?;
            }
            Ok(removed > 0)
        })
    }

    /// Ids of every entity carrying the label, ascending
    pub fn entities_with_label(&self, label: &str) -> SqliteResult<Vec<EntityId>> {
        self.pool().with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_id FROM entity_labels WHERE label = ?1 ORDER BY entity_id",
            )?;
            let ids = stmt
                .query_map([label], |row| row.get::<_, i64>(0))?
                .map(|r| r.map(EntityId))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

pub(super) fn insert_label(conn: &Connection, id: EntityId, label: &str) -> SqliteResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO entity_labels (entity_id, label) VALUES (?1, ?2)",
        params![id.get(), label],
    )?;
    Ok(inserted > 0)
}

pub(super) fn load_labels(conn: &Connection, id: EntityId) -> SqliteResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT label FROM entity_labels WHERE entity_id = ?1")?;
    let labels = stmt
        .query_map([id.get()], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(labels)
}
