//! Group and group-scope binding models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authorization group users can belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: String,
}

/// Scopes granted to every member of a group. One binding per group,
/// removed together with the group.
///
/// An empty scope set grants nothing. This is the opposite of the
/// [`ApiKey`](super::api_key::ApiKey) convention, where an empty set
/// means unrestricted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupScopes {
    pub group_id: Uuid,
    pub scopes: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupScopes {
    /// Exact membership test; an empty binding never matches.
    pub fn has_scope(&self, candidate: &str) -> bool {
        self.scopes.contains(candidate)
    }
}

/// Union of the scopes across `bindings`.
pub fn union_scopes<'a, I>(bindings: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a GroupScopes>,
{
    bindings
        .into_iter()
        .flat_map(|b| b.scopes.iter().cloned())
        .collect()
}
