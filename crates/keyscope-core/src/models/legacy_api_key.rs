//! Legacy (pre-scoping) API key model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A key from the legacy store, which had no notion of scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyApiKey {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    pub hashed_key: String,
    pub revoked: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLegacyApiKey {
    pub name: String,
    pub prefix: String,
    pub hashed_key: String,
    #[serde(default)]
    pub revoked: bool,
    pub expires_at: Option<DateTime<Utc>>,
}
