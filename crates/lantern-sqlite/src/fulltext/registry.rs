//! Namespace registry and FTS5 table layout
//!
//! Each namespace owns one FTS5 table. The rowid is the entity id, so an
//! entity has at most one row per namespace. Every property key written to
//! the namespace gets its own column, which is what makes column filters
//! such as `name:Brook*` work. Columns are added on first use by rebuilding
//! the table, since FTS5 has no `ALTER TABLE ... ADD COLUMN`.

use crate::error::{IndexContext, SqliteError, SqliteResult};
use chrono::Utc;
use lantern_core::{EntityId, IndexConfig, IndexError, IndexResult, Namespace};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

/// Write timestamp of the row, stored but never tokenized
pub(crate) const INDEXED_AT: &str = "_indexed_at";

const TOKENIZER: &str = "unicode61 remove_diacritics 2";

/// Names FTS5 or SQLite already give a meaning to inside the table
const RESERVED_KEYS: &[&str] = &["rank", "rowid", "oid", "_rowid_", INDEXED_AT];

/// A registered full-text index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    /// Namespace the index was created under
    pub namespace: String,
    /// Configuration recorded at creation
    pub config: IndexConfig,
    /// Property keys with a column in the index, in the order they were added
    pub columns: Vec<String>,
    pub(crate) table_name: String,
}

/// FTS5 table backing a namespace
///
/// Hex keeps arbitrary label text out of SQL identifiers and cannot collide
/// with the `_rebuild` suffix or the FTS5 shadow table suffixes.
pub(crate) fn table_name(namespace: &Namespace) -> String {
    format!("fts_{}", hex::encode(namespace.as_str()))
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn lookup(conn: &Connection, namespace: &str) -> SqliteResult<Option<IndexInfo>> {
    let row = conn
        .query_row(
            r#"
            SELECT namespace, table_name, provider, index_type, columns
            FROM fulltext_indexes
            WHERE namespace = ?1
            "#,
            [namespace],
            read_row,
        )
        .optional()?;

    row.map(parse_row).transpose()
}

pub(crate) fn list(conn: &Connection) -> SqliteResult<Vec<IndexInfo>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT namespace, table_name, provider, index_type, columns
        FROM fulltext_indexes
        ORDER BY namespace
        "#,
    )?;
    let rows = stmt
        .query_map([], read_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(parse_row).collect()
}

type RegistryRow = (String, String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RegistryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn parse_row(
    (namespace, table_name, provider, index_type, columns): RegistryRow,
) -> SqliteResult<IndexInfo> {
    let config = IndexConfig::from_names(&provider, &index_type).ok_or_else(|| {
        SqliteError::Serialization(format!(
            "unknown index configuration {}/{} for `{}`",
            provider, index_type, namespace
        ))
    })?;

    Ok(IndexInfo {
        namespace,
        config,
        columns: serde_json::from_str(&columns)?,
        table_name,
    })
}

/// Register the namespace and create its (column-less) table
pub(crate) fn create(
    conn: &Connection,
    namespace: &Namespace,
    config: &IndexConfig,
) -> SqliteResult<IndexInfo> {
    let info = IndexInfo {
        namespace: namespace.as_str().to_string(),
        config: *config,
        columns: Vec::new(),
        table_name: table_name(namespace),
    };

    create_table(conn, &info.table_name, &info.columns)?;
    conn.execute(
        r#"
        INSERT INTO fulltext_indexes (namespace, table_name, provider, index_type, columns)
        VALUES (?1, ?2, ?3, ?4, '[]')
        "#,
        params![
            info.namespace,
            info.table_name,
            config.provider_name(),
            config.kind_name()
        ],
    )?;

    info!(namespace = %namespace, table = %info.table_name, "Created full-text index");
    Ok(info)
}

/// Drop the table and forget the namespace
pub(crate) fn drop_index(conn: &Connection, info: &IndexInfo) -> SqliteResult<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(&info.table_name)))?;
    conn.execute(
        "DELETE FROM fulltext_indexes WHERE namespace = ?1",
        [&info.namespace],
    )?;
    info!(namespace = %info.namespace, "Dropped full-text index");
    Ok(())
}

fn create_table(conn: &Connection, table: &str, columns: &[String]) -> SqliteResult<()> {
    let mut defs = vec![format!("{} UNINDEXED", INDEXED_AT)];
    defs.extend(columns.iter().map(|c| quote_ident(c)));

    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE {} USING fts5({}, tokenize = '{}');",
        quote_ident(table),
        defs.join(", "),
        TOKENIZER
    ))?;
    Ok(())
}

fn key_problem(info: &IndexInfo, key: &str) -> Option<&'static str> {
    if key.trim().is_empty() {
        Some("property key is empty")
    } else if RESERVED_KEYS.iter().any(|r| r.eq_ignore_ascii_case(key)) {
        Some("property key is reserved by the index")
    } else if key.eq_ignore_ascii_case(&info.table_name) {
        Some("property key collides with the index table name")
    } else {
        None
    }
}

/// Whether `key` could ever be a column of this index
pub(crate) fn can_host(info: &IndexInfo, key: &str) -> bool {
    key_problem(info, key).is_none()
}

fn invalid_key(info: &IndexInfo, key: &str, reason: impl Into<String>) -> IndexError {
    IndexError::InvalidProperty {
        namespace: info.namespace.clone(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Column holding `key`, adding one if the index has not seen the key before
///
/// SQLite column names are case-insensitive, so a key that differs from an
/// indexed key only in case cannot get a column of its own and is rejected.
pub(crate) fn ensure_column(
    conn: &Connection,
    info: &mut IndexInfo,
    key: &str,
) -> IndexResult<String> {
    if let Some(reason) = key_problem(info, key) {
        return Err(invalid_key(info, key, reason));
    }

    if info.columns.iter().any(|c| c == key) {
        return Ok(key.to_string());
    }
    if let Some(existing) = info.columns.iter().find(|c| c.eq_ignore_ascii_case(key)) {
        return Err(invalid_key(
            info,
            key,
            format!("property key differs only in case from indexed key `{}`", existing),
        ));
    }

    let mut columns = info.columns.clone();
    columns.push(key.to_string());
    rebuild(conn, info, &columns)
        .and_then(|()| save_columns(conn, info, &columns))
        .index_context(|| format!("add column `{}` to index `{}`", key, info.namespace))?;

    debug!(namespace = %info.namespace, key, columns = columns.len(), "Added index column");
    info.columns = columns;
    Ok(key.to_string())
}

/// Give the table empty columns for `keys` without registering them
///
/// Used to evaluate a query that filters on keys the index has never stored.
/// The caller runs this inside a transaction it rolls back.
pub(crate) fn add_empty_columns(
    conn: &Connection,
    info: &IndexInfo,
    keys: &[String],
) -> SqliteResult<()> {
    let columns: Vec<String> = info.columns.iter().chain(keys).cloned().collect();
    rebuild(conn, info, &columns)
}

/// Recreate the table with `columns`, copying the registered columns across
fn rebuild(conn: &Connection, info: &IndexInfo, columns: &[String]) -> SqliteResult<()> {
    let table = quote_ident(&info.table_name);
    let staging = quote_ident(&format!("{}_rebuild", info.table_name));

    create_table(conn, &format!("{}_rebuild", info.table_name), columns)?;

    let copied: Vec<String> = ["rowid".to_string(), INDEXED_AT.to_string()]
        .into_iter()
        .chain(info.columns.iter().map(|c| quote_ident(c)))
        .collect();
    let copied = copied.join(", ");

    conn.execute_batch(&format!(
        "INSERT INTO {staging}({copied}) SELECT {copied} FROM {table};
         DROP TABLE {table};
         ALTER TABLE {staging} RENAME TO {table};",
        staging = staging,
        copied = copied,
        table = table
    ))?;
    Ok(())
}

fn save_columns(conn: &Connection, info: &IndexInfo, columns: &[String]) -> SqliteResult<()> {
    conn.execute(
        "UPDATE fulltext_indexes SET columns = ?1 WHERE namespace = ?2",
        params![serde_json::to_string(columns)?, info.namespace],
    )?;
    Ok(())
}

/// Append `text` to the entity's value in `column`
///
/// Repeated adds for one key accumulate, the way a multi-valued field would.
pub(crate) fn append_value(
    conn: &Connection,
    info: &IndexInfo,
    column: &str,
    entity_id: EntityId,
    text: &str,
) -> SqliteResult<()> {
    let table = quote_ident(&info.table_name);
    let column = quote_ident(column);
    let now = Utc::now().to_rfc3339();

    let existing: Option<Option<String>> = conn
        .query_row(
            &format!("SELECT {} FROM {} WHERE rowid = ?1", column, table),
            [entity_id.get()],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO {}(rowid, {}, {}) VALUES (?1, ?2, ?3)",
                    table, INDEXED_AT, column
                ),
                params![entity_id.get(), now, text],
            )?;
        }
        Some(previous) => {
            let merged = match previous {
                Some(p) if !p.is_empty() => format!("{} {}", p, text),
                _ => text.to_string(),
            };
            conn.execute(
                &format!(
                    "UPDATE {} SET {} = ?1, {} = ?2 WHERE rowid = ?3",
                    table, column, INDEXED_AT
                ),
                params![merged, now, entity_id.get()],
            )?;
        }
    }
    Ok(())
}

/// Delete the entity's row; a no-op if it has none
pub(crate) fn remove_entity(
    conn: &Connection,
    info: &IndexInfo,
    entity_id: EntityId,
) -> SqliteResult<usize> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE rowid = ?1", quote_ident(&info.table_name)),
        [entity_id.get()],
    )?;
    Ok(removed)
}

/// Stored value of one column, for inspection and tests
pub(crate) fn stored_value(
    conn: &Connection,
    info: &IndexInfo,
    column: &str,
    entity_id: EntityId,
) -> SqliteResult<Option<String>> {
    let value: Option<Option<String>> = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE rowid = ?1",
                quote_ident(column),
                quote_ident(&info.table_name)
            ),
            [entity_id.get()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.flatten())
}
