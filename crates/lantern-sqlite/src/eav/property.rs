//! Property values, stored as tagged JSON

use super::entity::{require, touch, SqliteEntityStore};
use crate::error::SqliteResult;
use lantern_core::{EntityId, Properties, PropertyValue};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

impl SqliteEntityStore {
    /// Set or overwrite one property
    pub fn set_property(&self, id: EntityId, key: &str, value: &PropertyValue) -> SqliteResult<()> {
        self.pool().with_connection(|conn| {
            require(conn, id)?;
            write_property(conn, id, key, value)?;
            touch(conn, id)
        })
    }

    /// Remove one property; returns false if it was not set
    pub fn remove_property(&self, id: EntityId, key: &str) -> SqliteResult<bool> {
        self.pool().with_connection(|conn| {
            require(conn, id)?;
            let removed = conn.execute(
                "DELETE FROM entity_properties WHERE entity_id = ?1 AND key = ?2",
                params![id.get(), key],
            )?;
            if removed > 0 {
                touch(conn, id)?;
            }
            Ok(removed > 0)
        })
    }
}

pub(super) fn write_property(
    conn: &Connection,
    id: EntityId,
    key: &str,
    value: &PropertyValue,
) -> SqliteResult<()> {
    let json = serde_json::to_string(value)?;
    conn.execute(
        r#"
        INSERT INTO entity_properties (entity_id, key, value)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(entity_id, key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
        params![id.get(), key, json],
    )?;
    Ok(())
}

/// Properties of one entity in a single statement
///
/// `keys == None` loads everything; `Some(&[])` loads nothing.
pub(super) fn load_properties(
    conn: &Connection,
    id: EntityId,
    keys: Option<&[String]>,
) -> SqliteResult<Properties> {
    let mut sql = String::from("SELECT key, value FROM entity_properties WHERE entity_id = ?1");
    let mut args = vec![Value::Integer(id.get())];

    if let Some(keys) = keys {
        if keys.is_empty() {
            return Ok(Properties::new());
        }
        let placeholders: Vec<String> = (0..keys.len()).map(|i| format!("?{}", i + 2)).collect();
        sql.push_str(&format!(" AND key IN ({})", placeholders.join(", ")));
        args.extend(keys.iter().map(|k| Value::Text(k.clone())));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut properties = Properties::new();
    for row in rows {
        let (key, json) = row?;
        properties.insert(key, serde_json::from_str(&json)?);
    }
    Ok(properties)
}
