//! Paged FTS5 query execution
//!
//! Results are pulled one page at a time with `LIMIT`/`OFFSET`. The
//! connection lock is held only while a page is fetched, so a caller that
//! stops early never reads the remaining pages, and writers are not
//! blocked by a half-consumed result set.
//!
//! FTS5 refuses a column filter naming a column the table lacks. Such a
//! query is re-run inside a transaction that gives the table empty columns
//! for the missing keys and is then rolled back, so the filter matches
//! nothing while the rest of the query is evaluated as written.

use super::registry::{self, quote_ident};
use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};
use lantern_core::{EntityId, IndexError, IndexResult, RawHit};
use rusqlite::{params, Connection};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Upper bound on missing columns added for one page
const MAX_EMPTY_COLUMNS: usize = 32;

enum QueryFailure {
    /// The query filters on a column the table does not have
    UnknownColumn(String),
    /// FTS5 rejected the query text
    Syntax(String),
    Backend,
}

fn classify(err: &SqliteError) -> QueryFailure {
    let SqliteError::Rusqlite(inner) = err else {
        return QueryFailure::Backend;
    };

    let message = inner.to_string();
    if let Some(column) = message.strip_prefix("no such column:") {
        QueryFailure::UnknownColumn(column.trim().to_string())
    } else if message.contains("fts5:")
        || message.contains("syntax error")
        || message.contains("unterminated string")
        || message.contains("unknown special query")
        || message.starts_with("expected integer")
    {
        QueryFailure::Syntax(message)
    } else {
        QueryFailure::Backend
    }
}

/// Lazy hit sequence over one namespace's FTS5 table
pub(crate) struct SqliteHits {
    pool: SqlitePool,
    namespace: String,
    sql: String,
    query: String,
    page_size: usize,
    offset: usize,
    buffer: VecDeque<RawHit>,
    exhausted: bool,
    pages_fetched: Arc<AtomicUsize>,
}

impl SqliteHits {
    /// Run the query and fetch its first page
    ///
    /// Fetching eagerly surfaces malformed queries from the call that
    /// issued them rather than from the first `next()`.
    pub(crate) fn open(
        pool: SqlitePool,
        namespace: &str,
        table_name: &str,
        query: &str,
        page_size: usize,
        pages_fetched: Arc<AtomicUsize>,
    ) -> IndexResult<Self> {
        let table = quote_ident(table_name);
        let sql = format!(
            "SELECT rowid, bm25({t}) FROM {t} WHERE {t} MATCH ?1 \
             ORDER BY rank, rowid LIMIT ?2 OFFSET ?3",
            t = table
        );

        let mut hits = Self {
            pool,
            namespace: namespace.to_string(),
            sql,
            query: query.to_string(),
            page_size: page_size.max(1),
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched,
        };
        hits.fetch_page()?;
        Ok(hits)
    }

    fn fetch_page(&mut self) -> IndexResult<()> {
        let page = {
            let conn = self.pool.lock();
            self.read_page(&conn)
        };

        let page = match page {
            Ok(page) => page,
            Err(err) => {
                self.exhausted = true;
                return Err(err);
            }
        };

        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.offset += page.len();
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }

    fn run(&self, conn: &Connection) -> SqliteResult<Vec<RawHit>> {
        let limit = self.page_size as i64;
        let offset = self.offset as i64;

        let mut stmt = conn.prepare(&self.sql)?;
        let rows = stmt.query_map(params![self.query, limit, offset], |row| {
            Ok(RawHit {
                entity_id: EntityId(row.get(0)?),
                score: -row.get::<_, f64>(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn read_page(&self, conn: &Connection) -> IndexResult<Vec<RawHit>> {
        let err = match self.run(conn) {
            Ok(page) => return Ok(page),
            Err(err) => err,
        };
        match classify(&err) {
            QueryFailure::UnknownColumn(column) => self.read_page_with_empty_columns(conn, column),
            failure => Err(self.failure(failure, err)),
        }
    }

    fn read_page_with_empty_columns(
        &self,
        conn: &Connection,
        column: String,
    ) -> IndexResult<Vec<RawHit>> {
        let context = || format!("query index `{}`", self.namespace);
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| SqliteError::from(e).into_index_error(context()))?;
        let info = registry::lookup(&tx, &self.namespace)
            .map_err(|e| e.into_index_error(context()))?
            .ok_or_else(|| IndexError::unavailable(context(), "index was dropped"))?;

        let mut missing = vec![column];
        loop {
            let newest = &missing[missing.len() - 1];
            if !registry::can_host(&info, newest) {
                return Err(IndexError::malformed_query(
                    self.namespace.as_str(),
                    self.query.as_str(),
                    format!("no such column: {}", newest),
                ));
            }

            registry::add_empty_columns(&tx, &info, &missing)
                .map_err(|e| e.into_index_error(context()))?;

            let err = match self.run(&tx) {
                Ok(page) => {
                    debug!(
                        namespace = %self.namespace,
                        query = %self.query,
                        missing = ?missing,
                        "Query filters on properties the index has never stored"
                    );
                    // dropping `tx` rolls the empty columns back
                    return Ok(page);
                }
                Err(err) => err,
            };

            match classify(&err) {
                QueryFailure::UnknownColumn(next)
                    if !missing.contains(&next) && missing.len() < MAX_EMPTY_COLUMNS =>
                {
                    missing.push(next);
                }
                QueryFailure::UnknownColumn(_) => {
                    return Err(err.into_index_error(context()));
                }
                failure => return Err(self.failure(failure, err)),
            }
        }
    }

    fn failure(&self, failure: QueryFailure, err: SqliteError) -> IndexError {
        match failure {
            QueryFailure::Syntax(reason) => IndexError::malformed_query(
                self.namespace.as_str(),
                self.query.as_str(),
                reason,
            ),
            QueryFailure::UnknownColumn(_) | QueryFailure::Backend => {
                err.into_index_error(format!("query index `{}`", self.namespace))
            }
        }
    }
}

impl Iterator for SqliteHits {
    type Item = IndexResult<RawHit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(message: &str) -> SqliteError {
        SqliteError::Rusqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some(message.to_string()),
        ))
    }

    #[test]
    fn test_classify_unknown_column() {
        match classify(&sqlite_failure("no such column: ghost")) {
            QueryFailure::UnknownColumn(column) => assert_eq!(column, "ghost"),
            _ => panic!("expected an unknown column failure"),
        }
    }

    #[test]
    fn test_classify_syntax_error() {
        match classify(&sqlite_failure("fts5: syntax error near \"(\"")) {
            QueryFailure::Syntax(reason) => assert!(reason.contains("syntax error")),
            _ => panic!("expected a syntax failure"),
        }
    }

    #[test]
    fn test_classify_other_failures() {
        assert!(matches!(
            classify(&sqlite_failure("database is locked")),
            QueryFailure::Backend
        ));
        assert!(matches!(
            classify(&SqliteError::Connection("gone".into())),
            QueryFailure::Backend
        ));
    }
}
