//! SurrealDB implementation of [`GroupRepository`].

use chrono::{DateTime, Utc};
use keyscope_core::error::KeyscopeResult;
use keyscope_core::models::group::{CreateGroup, Group};
use keyscope_core::repository::{GroupRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self, id: Uuid) -> Group {
        Group {
            id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id)?,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> KeyscopeResult<Group> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('group', $id) SET \
                 name = $name, description = $description",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id_str))?;

        Ok(row.into_group(id))
    }

    async fn get_by_id(&self, id: Uuid) -> KeyscopeResult<Group> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id_str))?;

        Ok(row.into_group(id))
    }

    async fn get_by_name(&self, name: &str) -> KeyscopeResult<Group> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE name = $name LIMIT 1",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", name))?;

        Ok(row.try_into_group()?)
    }

    async fn delete(&self, id: Uuid) -> KeyscopeResult<()> {
        self.get_by_id(id).await?;
        let id_str = id.to_string();

        // Membership edges and the scope binding go with the group.
        let query = format!(
            "DELETE member_of WHERE out = group:`{id_str}`; \
             DELETE type::record('group_scopes', $id); \
             DELETE type::record('group', $id);"
        );

        self.db
            .query(query)
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(group_id = %id, "Deleted group");
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> KeyscopeResult<PaginatedResult<Group>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM group GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_member(&self, user_id: Uuid, group_id: Uuid) -> KeyscopeResult<()> {
        let user_id_str = user_id.to_string();
        let group_id_str = group_id.to_string();

        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE id = type::record('user', $user_id) GROUP ALL; \
                 SELECT count() AS total FROM group \
                 WHERE id = type::record('group', $group_id) GROUP ALL; \
                 SELECT count() AS total FROM member_of \
                 WHERE in = type::record('user', $user_id) \
                 AND out = type::record('group', $group_id) GROUP ALL;",
            )
            .bind(("user_id", user_id_str.clone()))
            .bind(("group_id", group_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let user_count: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if user_count.first().map(|r| r.total).unwrap_or(0) == 0 {
            return Err(DbError::not_found("user", user_id_str).into());
        }

        let group_count: Vec<CountRow> = check.take(1).map_err(DbError::from)?;
        if group_count.first().map(|r| r.total).unwrap_or(0) == 0 {
            return Err(DbError::not_found("group", group_id_str).into());
        }

        let edge_count: Vec<CountRow> = check.take(2).map_err(DbError::from)?;
        if edge_count.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Ok(());
        }

        let query = format!("RELATE user:`{user_id_str}` -> member_of -> group:`{group_id_str}`;");

        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn remove_member(&self, user_id: Uuid, group_id: Uuid) -> KeyscopeResult<()> {
        self.db
            .query(
                "DELETE member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_user_groups(&self, user_id: Uuid) -> KeyscopeResult<Vec<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE id IN (\
                     SELECT VALUE out FROM member_of \
                     WHERE in = type::record('user', $user_id)\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let groups = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(groups)
    }
}
