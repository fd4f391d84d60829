//! SurrealDB implementation of [`ApiKeyRepository`].

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use keyscope_core::error::KeyscopeResult;
use keyscope_core::key;
use keyscope_core::models::api_key::{ApiKey, CreateApiKey, ImportApiKey, UpdateApiKey};
use keyscope_core::repository::{ApiKeyRepository, PaginatedResult, Pagination};
use keyscope_core::scope::validate_scopes;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ApiKeyRow {
    name: String,
    prefix: String,
    hashed_key: String,
    scopes: Vec<String>,
    revoked: bool,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ApiKeyRow {
    fn into_api_key(self, id: Uuid) -> ApiKey {
        ApiKey {
            id,
            name: self.name,
            prefix: self.prefix,
            hashed_key: self.hashed_key,
            scopes: self.scopes.into_iter().collect(),
            revoked: self.revoked,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ApiKeyRowWithId {
    record_id: String,
    name: String,
    prefix: String,
    hashed_key: String,
    scopes: Vec<String>,
    revoked: bool,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ApiKeyRowWithId {
    fn try_into_api_key(self) -> Result<ApiKey, DbError> {
        let id = parse_uuid(&self.record_id)?;
        Ok(ApiKeyRow {
            name: self.name,
            prefix: self.prefix,
            hashed_key: self.hashed_key,
            scopes: self.scopes,
            revoked: self.revoked,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
        .into_api_key(id))
    }
}

#[derive(Debug, SurrealValue)]
struct PrefixRow {
    prefix: String,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn scope_list(scopes: BTreeSet<String>) -> Vec<String> {
    scopes.into_iter().collect()
}

/// SurrealDB implementation of the API key repository.
#[derive(Clone)]
pub struct SurrealApiKeyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealApiKeyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Fetch a single key matching `field = $value`.
    async fn find_one(&self, field: &str, value: &str) -> KeyscopeResult<ApiKey> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM api_key \
             WHERE {field} = $value LIMIT 1"
        );

        let mut result = self
            .db
            .query(query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("api_key", value))?;

        Ok(row.try_into_api_key()?)
    }
}

impl<C: Connection> ApiKeyRepository for SurrealApiKeyRepository<C> {
    async fn create(&self, input: CreateApiKey) -> KeyscopeResult<(ApiKey, String)> {
        validate_scopes(&input.scopes)?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let generated = key::generate_key();

        let result = self
            .db
            .query(
                "CREATE type::record('api_key', $id) SET \
                 name = $name, \
                 prefix = $prefix, \
                 hashed_key = $hashed_key, \
                 scopes = $scopes, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("prefix", generated.prefix))
            .bind(("hashed_key", generated.hashed_key))
            .bind(("scopes", scope_list(input.scopes)))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("api_key", id_str))?;

        let api_key = row.into_api_key(id);
        info!(key_id = %api_key.id, prefix = %api_key.prefix, "Issued API key");

        Ok((api_key, generated.plaintext))
    }

    async fn get_by_id(&self, id: Uuid) -> KeyscopeResult<ApiKey> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('api_key', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("api_key", id_str))?;

        Ok(row.into_api_key(id))
    }

    async fn get_by_prefix(&self, prefix: &str) -> KeyscopeResult<ApiKey> {
        self.find_one("prefix", prefix).await
    }

    async fn get_by_hash(&self, hashed_key: &str) -> KeyscopeResult<ApiKey> {
        self.find_one("hashed_key", hashed_key).await
    }

    async fn update(&self, id: Uuid, input: UpdateApiKey) -> KeyscopeResult<ApiKey> {
        if let Some(scopes) = &input.scopes {
            validate_scopes(scopes)?;
        }

        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.scopes.is_some() {
            sets.push("scopes = $scopes");
        }
        if input.expires_at.is_some() {
            sets.push("expires_at = $expires_at");
        }
        if sets.is_empty() {
            return self.get_by_id(id).await;
        }

        let query = format!(
            "UPDATE type::record('api_key', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(scopes) = input.scopes {
            builder = builder.bind(("scopes", scope_list(scopes)));
        }
        if let Some(expires_at) = input.expires_at {
            builder = builder.bind(("expires_at", expires_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("api_key", id_str))?;

        Ok(row.into_api_key(id))
    }

    async fn revoke(&self, id: Uuid) -> KeyscopeResult<ApiKey> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("UPDATE type::record('api_key', $id) SET revoked = true")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("api_key", id_str))?;

        let api_key = row.into_api_key(id);
        info!(key_id = %id, prefix = %api_key.prefix, "Revoked API key");
        Ok(api_key)
    }

    async fn delete(&self, id: Uuid) -> KeyscopeResult<()> {
        // Surface NotFound for unknown ids.
        self.get_by_id(id).await?;

        self.db
            .query("DELETE type::record('api_key', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> KeyscopeResult<PaginatedResult<ApiKey>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM api_key GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM api_key \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_api_key())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_prefixes(&self) -> KeyscopeResult<HashSet<String>> {
        let mut result = self
            .db
            .query("SELECT prefix FROM api_key")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrefixRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.prefix).collect())
    }

    async fn import(&self, input: ImportApiKey) -> KeyscopeResult<ApiKey> {
        let id = input.id;
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('api_key', $id) SET \
                 name = $name, \
                 prefix = $prefix, \
                 hashed_key = $hashed_key, \
                 scopes = [], \
                 revoked = $revoked, \
                 expires_at = $expires_at, \
                 created_at = $created_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("prefix", input.prefix))
            .bind(("hashed_key", input.hashed_key))
            .bind(("revoked", input.revoked))
            .bind(("expires_at", input.expires_at))
            .bind(("created_at", input.created_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("api_key", id_str))?;

        Ok(row.into_api_key(id))
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> KeyscopeResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("UPDATE type::record('api_key', $id) SET last_used_at = $at")
            .bind(("id", id_str.clone()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("api_key", id_str).into());
        }

        Ok(())
    }
}
