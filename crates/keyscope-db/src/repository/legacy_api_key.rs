//! SurrealDB implementation of [`LegacyApiKeyRepository`].

use chrono::{DateTime, Utc};
use keyscope_core::error::KeyscopeResult;
use keyscope_core::models::legacy_api_key::{CreateLegacyApiKey, LegacyApiKey};
use keyscope_core::repository::LegacyApiKeyRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct LegacyRow {
    record_id: String,
    name: String,
    prefix: String,
    hashed_key: String,
    revoked: bool,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl LegacyRow {
    fn try_into_legacy(self) -> Result<LegacyApiKey, DbError> {
        Ok(LegacyApiKey {
            id: parse_uuid(&self.record_id)?,
            name: self.name,
            prefix: self.prefix,
            hashed_key: self.hashed_key,
            revoked: self.revoked,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CreatedRow {
    created_at: DateTime<Utc>,
}

/// Read access to the pre-scoping key store.
#[derive(Clone)]
pub struct SurrealLegacyApiKeyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealLegacyApiKeyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> LegacyApiKeyRepository for SurrealLegacyApiKeyRepository<C> {
    async fn create(&self, input: CreateLegacyApiKey) -> KeyscopeResult<LegacyApiKey> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('legacy_api_key', $id) SET \
                 name = $name, prefix = $prefix, hashed_key = $hashed_key, \
                 revoked = $revoked, expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name.clone()))
            .bind(("prefix", input.prefix.clone()))
            .bind(("hashed_key", input.hashed_key.clone()))
            .bind(("revoked", input.revoked))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CreatedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("legacy_api_key", id_str))?;

        Ok(LegacyApiKey {
            id,
            name: input.name,
            prefix: input.prefix,
            hashed_key: input.hashed_key,
            revoked: input.revoked,
            expires_at: input.expires_at,
            created_at: row.created_at,
        })
    }

    async fn list(&self) -> KeyscopeResult<Vec<LegacyApiKey>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM legacy_api_key \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LegacyRow> = result.take(0).map_err(DbError::from)?;
        let keys = rows
            .into_iter()
            .map(|row| row.try_into_legacy())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(keys)
    }
}
