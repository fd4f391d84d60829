//! SurrealDB implementation of [`GroupScopeRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use keyscope_core::error::KeyscopeResult;
use keyscope_core::models::group::GroupScopes;
use keyscope_core::repository::GroupScopeRepository;
use keyscope_core::scope::validate_scopes;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct GroupScopesRow {
    group_id: String,
    scopes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupScopesRow {
    fn try_into_binding(self) -> Result<GroupScopes, DbError> {
        Ok(GroupScopes {
            group_id: parse_uuid(&self.group_id)?,
            scopes: self.scopes.into_iter().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the group scope binding repository.
///
/// Bindings are stored in `group_scopes`, keyed by the group UUID, so a
/// group has at most one.
#[derive(Clone)]
pub struct SurrealGroupScopeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupScopeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> GroupScopeRepository for SurrealGroupScopeRepository<C> {
    async fn set_scopes(
        &self,
        group_id: Uuid,
        scopes: BTreeSet<String>,
    ) -> KeyscopeResult<GroupScopes> {
        validate_scopes(&scopes)?;
        let group_id_str = group_id.to_string();

        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM group \
                 WHERE id = type::record('group', $group_id) GROUP ALL",
            )
            .bind(("group_id", group_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let group_count: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if group_count.first().map(|r| r.total).unwrap_or(0) == 0 {
            return Err(DbError::not_found("group", group_id_str).into());
        }

        let scope_count = scopes.len();
        let result = self
            .db
            .query(
                "UPSERT type::record('group_scopes', $group_id) SET \
                 group_id = $group_id, \
                 scopes = $scopes, \
                 updated_at = time::now()",
            )
            .bind(("group_id", group_id_str.clone()))
            .bind(("scopes", scopes.into_iter().collect::<Vec<_>>()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<GroupScopesRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group_scopes", group_id_str))?;

        info!(group_id = %group_id, scopes = scope_count, "Set group scopes");
        Ok(row.try_into_binding()?)
    }

    async fn get_by_group(&self, group_id: Uuid) -> KeyscopeResult<GroupScopes> {
        let group_id_str = group_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('group_scopes', $group_id)")
            .bind(("group_id", group_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupScopesRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group_scopes", group_id_str))?;

        Ok(row.try_into_binding()?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> KeyscopeResult<Vec<GroupScopes>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM group_scopes \
                 WHERE group_id IN (\
                     SELECT VALUE meta::id(out) FROM member_of \
                     WHERE in = type::record('user', $user_id)\
                 ) \
                 ORDER BY group_id ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupScopesRow> = result.take(0).map_err(DbError::from)?;
        let bindings = rows
            .into_iter()
            .map(|row| row.try_into_binding())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(bindings)
    }
}
