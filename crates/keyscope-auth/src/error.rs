//! Authentication error types.

use keyscope_core::error::KeyscopeError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid API key")]
    InvalidKey,

    #[error("API key has been revoked")]
    KeyRevoked,

    #[error("API key has expired")]
    KeyExpired,
}

impl From<AuthError> for KeyscopeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidKey | AuthError::KeyRevoked | AuthError::KeyExpired => {
                KeyscopeError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_distinguishable() {
        let reasons: Vec<String> = [AuthError::InvalidKey, AuthError::KeyRevoked, AuthError::KeyExpired]
            .into_iter()
            .map(|e| match KeyscopeError::from(e) {
                KeyscopeError::AuthenticationFailed { reason } => reason,
                other => panic!("unexpected {other:?}"),
            })
            .collect();

        assert!(reasons[0].contains("invalid"));
        assert!(reasons[1].contains("revoked"));
        assert!(reasons[2].contains("expired"));
    }
}
