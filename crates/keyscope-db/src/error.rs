//! Database-specific error types and conversions.

use keyscope_core::error::KeyscopeError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A statement was rejected (constraint violation, type mismatch).
    #[error("Query failed: {0}")]
    Query(String),

    /// A stored row could not be mapped back onto a domain type.
    #[error("Corrupt record: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<DbError> for KeyscopeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => KeyscopeError::NotFound { entity, id },
            other => KeyscopeError::Database(other.to_string()),
        }
    }
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid UUID '{raw}': {e}")))
}
