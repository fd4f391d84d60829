//! API key domain model.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::legacy_api_key::LegacyApiKey;

/// A long-lived API key.
///
/// # Empty scopes mean unrestricted
///
/// A key whose `scopes` set is empty predates scoping and is granted
/// every scope. This is the reverse of
/// [`GroupScopes`](super::group::GroupScopes), where an empty set grants
/// nothing. Migrated legacy keys rely on this; do not "fix" it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub name: String,
    /// Public part of the plaintext key; unique.
    pub prefix: String,
    /// SHA-256 of the full plaintext key, hex-encoded.
    pub hashed_key: String,
    pub scopes: BTreeSet<String>,
    pub revoked: bool,
    /// `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Only maintained when usage tracking is enabled.
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// True when the key carries no scopes (legacy, unrestricted mode).
    pub fn is_unrestricted(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether this key grants `candidate`: always for unrestricted
    /// keys, otherwise exact membership.
    pub fn has_scope(&self, candidate: &str) -> bool {
        self.is_unrestricted() || self.scopes.contains(candidate)
    }

    /// Whether the expiry timestamp lies before `now`.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            write!(f, "{} (unrestricted)", self.name)
        } else {
            write!(f, "{} ({} scopes)", self.name, self.scopes.len())
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateApiKey {
    pub name: String,
    /// Leave empty for an unrestricted key.
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateApiKey {
    pub name: Option<String>,
    pub scopes: Option<BTreeSet<String>>,
    /// `Some(Some(t))` = set, `Some(None)` = clear, `None` = no change.
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// An existing key copied into the scoped store as-is, with no scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiKey {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    pub hashed_key: String,
    pub revoked: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<LegacyApiKey> for ImportApiKey {
    fn from(key: LegacyApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            prefix: key.prefix,
            hashed_key: key.hashed_key,
            revoked: key.revoked,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}
