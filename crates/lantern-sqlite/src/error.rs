//! Error types for SQLite storage

use lantern_core::{EntityId, IndexError, IndexResult};
use thiserror::Error;

/// SQLite storage error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema/migration error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<serde_json::Error> for SqliteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl SqliteError {
    /// Convert into an [`IndexError`], describing what was being attempted
    pub fn into_index_error(self, context: impl Into<String>) -> IndexError {
        match self {
            Self::EntityNotFound(entity_id) => IndexError::EntityNotFound { entity_id },
            other => IndexError::unavailable(context, other),
        }
    }
}

impl From<SqliteError> for IndexError {
    fn from(err: SqliteError) -> Self {
        err.into_index_error("sqlite")
    }
}

/// Attach context while converting storage failures into [`IndexError`]
pub(crate) trait IndexContext<T> {
    fn index_context<F: FnOnce() -> String>(self, context: F) -> IndexResult<T>;
}

impl<T, E: Into<SqliteError>> IndexContext<T> for Result<T, E> {
    fn index_context<F: FnOnce() -> String>(self, context: F) -> IndexResult<T> {
        self.map_err(|e| e.into().into_index_error(context()))
    }
}
