//! Index Error Types
//!
//! Every failure surfaced by the indexer, the query engine or a store
//! implementation is one of these variants. Context (entity id, namespace,
//! label) is attached where the failure happens; nothing is retried here.

use crate::entity::EntityId;
use thiserror::Error;

/// Error type for indexing and search operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The referenced entity does not exist in the entity store
    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: EntityId },

    /// The index store rejected the query syntax
    #[error("Malformed query `{query}` for index `{namespace}`: {reason}")]
    MalformedQuery {
        namespace: String,
        query: String,
        reason: String,
    },

    /// The backing store could not service a read or write
    #[error("Index unavailable ({context}): {reason}")]
    IndexUnavailable { context: String, reason: String },

    /// A property key cannot be stored in the index
    #[error("Invalid property `{key}` for index `{namespace}`: {reason}")]
    InvalidProperty {
        namespace: String,
        key: String,
        reason: String,
    },

    /// An index exists under the namespace with a different configuration
    #[error("Index `{namespace}` exists with configuration {stored}, requested {requested}")]
    IndexConfigMismatch {
        namespace: String,
        stored: String,
        requested: String,
    },
}

/// Result type for indexing and search operations
pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    /// Create an `IndexUnavailable` error
    pub fn unavailable(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::IndexUnavailable {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a `MalformedQuery` error
    pub fn malformed_query(
        namespace: impl Into<String>,
        query: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::MalformedQuery {
            namespace: namespace.into(),
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    /// Prefix the context of an `IndexUnavailable` error with the label being processed
    ///
    /// Other variants already carry their own identifying fields and are returned unchanged.
    pub fn with_label(self, label: &str) -> Self {
        match self {
            Self::IndexUnavailable { context, reason } => Self::IndexUnavailable {
                context: format!("label `{}`: {}", label, context),
                reason,
            },
            other => other,
        }
    }

    /// Whether the caller supplied bad input, as opposed to a store failure
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. } | Self::MalformedQuery { .. } | Self::InvalidProperty { .. }
        )
    }
}
