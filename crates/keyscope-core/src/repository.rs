//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The authentication and
//! authorization layers depend only on these traits, never on a storage
//! crate.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::KeyscopeResult;
use crate::models::{
    api_key::{ApiKey, CreateApiKey, ImportApiKey, UpdateApiKey},
    group::{CreateGroup, Group, GroupScopes},
    legacy_api_key::{CreateLegacyApiKey, LegacyApiKey},
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

pub trait ApiKeyRepository: Send + Sync {
    /// Issue a new key. Returns the record and the one-time plaintext.
    fn create(
        &self,
        input: CreateApiKey,
    ) -> impl Future<Output = KeyscopeResult<(ApiKey, String)>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<ApiKey>> + Send;
    fn get_by_prefix(&self, prefix: &str)
    -> impl Future<Output = KeyscopeResult<ApiKey>> + Send;
    /// Look up a key by the hash of its plaintext.
    fn get_by_hash(
        &self,
        hashed_key: &str,
    ) -> impl Future<Output = KeyscopeResult<ApiKey>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateApiKey,
    ) -> impl Future<Output = KeyscopeResult<ApiKey>> + Send;
    /// Mark a key revoked. Revocation is permanent.
    fn revoke(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<ApiKey>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = KeyscopeResult<PaginatedResult<ApiKey>>> + Send;
    /// Every prefix in the store, for duplicate detection.
    fn list_prefixes(&self) -> impl Future<Output = KeyscopeResult<HashSet<String>>> + Send;
    /// Insert an existing key verbatim with an empty scope set.
    fn import(&self, input: ImportApiKey) -> impl Future<Output = KeyscopeResult<ApiKey>> + Send;
    /// Record usage. Callers treat failure as non-fatal.
    fn touch_last_used(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = KeyscopeResult<()>> + Send;
}

pub trait LegacyApiKeyRepository: Send + Sync {
    fn create(
        &self,
        input: CreateLegacyApiKey,
    ) -> impl Future<Output = KeyscopeResult<LegacyApiKey>> + Send;
    fn list(&self) -> impl Future<Output = KeyscopeResult<Vec<LegacyApiKey>>> + Send;
}

// ---------------------------------------------------------------------------
// Users and groups
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = KeyscopeResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<User>> + Send;
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = KeyscopeResult<User>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<()>> + Send;
}

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = KeyscopeResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<Group>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = KeyscopeResult<Group>> + Send;
    /// Delete a group together with its memberships and scope binding.
    fn delete(&self, id: Uuid) -> impl Future<Output = KeyscopeResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = KeyscopeResult<PaginatedResult<Group>>> + Send;

    /// Add a user to a group (creates a `member_of` edge).
    fn add_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = KeyscopeResult<()>> + Send;

    /// Remove a user from a group.
    fn remove_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = KeyscopeResult<()>> + Send;

    /// Get all groups a user belongs to.
    fn get_user_groups(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = KeyscopeResult<Vec<Group>>> + Send;
}

pub trait GroupScopeRepository: Send + Sync {
    /// Create or replace the scope binding of a group.
    fn set_scopes(
        &self,
        group_id: Uuid,
        scopes: BTreeSet<String>,
    ) -> impl Future<Output = KeyscopeResult<GroupScopes>> + Send;
    fn get_by_group(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = KeyscopeResult<GroupScopes>> + Send;
    /// Bindings of every group `user_id` belongs to, fetched in a single
    /// round trip. Groups without a binding are simply absent.
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = KeyscopeResult<Vec<GroupScopes>>> + Send;
}
