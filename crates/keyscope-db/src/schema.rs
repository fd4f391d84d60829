//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as record keys and, where
//! another table refers to them, as strings. Scope sets are stored as
//! string arrays.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "group_scopes",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: credentials, users and groups
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- API keys
-- =======================================================================
DEFINE TABLE api_key SCHEMAFULL;
DEFINE FIELD name ON TABLE api_key TYPE string;
DEFINE FIELD prefix ON TABLE api_key TYPE string;
DEFINE FIELD hashed_key ON TABLE api_key TYPE string;
DEFINE FIELD scopes ON TABLE api_key TYPE array<string> DEFAULT [];
DEFINE FIELD revoked ON TABLE api_key TYPE bool DEFAULT false;
DEFINE FIELD expires_at ON TABLE api_key TYPE option<datetime>;
DEFINE FIELD last_used_at ON TABLE api_key TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE api_key TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_api_key_prefix ON TABLE api_key COLUMNS prefix UNIQUE;
DEFINE INDEX idx_api_key_hash ON TABLE api_key COLUMNS hashed_key UNIQUE;

-- =======================================================================
-- Legacy API keys (pre-scoping store, read by the migration)
-- =======================================================================
DEFINE TABLE legacy_api_key SCHEMAFULL;
DEFINE FIELD name ON TABLE legacy_api_key TYPE string;
DEFINE FIELD prefix ON TABLE legacy_api_key TYPE string;
DEFINE FIELD hashed_key ON TABLE legacy_api_key TYPE string;
DEFINE FIELD revoked ON TABLE legacy_api_key TYPE bool DEFAULT false;
DEFINE FIELD expires_at ON TABLE legacy_api_key TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE legacy_api_key TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD is_superuser ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD description ON TABLE group TYPE string;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;

-- User -> Group membership
DEFINE TABLE member_of TYPE RELATION SCHEMAFULL;
";

// -----------------------------------------------------------------------
// Schema v2: per-group scope bindings
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- One binding per group, keyed by the group's UUID.
DEFINE TABLE group_scopes SCHEMAFULL;
DEFINE FIELD group_id ON TABLE group_scopes TYPE string;
DEFINE FIELD scopes ON TABLE group_scopes TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE group_scopes TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group_scopes TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_scopes_group ON TABLE group_scopes \
    COLUMNS group_id UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Latest schema version this build knows about.
pub fn schema_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
