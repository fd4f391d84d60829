//! Error types for keyscope.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyscopeError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    /// "Who are you" failures: unknown, revoked or expired credentials.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// "You can't do that" failures: a valid principal lacking the
    /// required scope.
    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KeyscopeError {
    /// True for credential failures, which callers surface as an
    /// authentication error rather than a permission error.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::AuthorizationDenied { .. })
    }
}

pub type KeyscopeResult<T> = Result<T, KeyscopeError>;
