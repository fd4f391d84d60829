//! SurrealDB connection management, schema migrations and
//! repository implementations for the `keyscope-core` traits.

mod connection;
mod error;
pub mod key_migration;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use key_migration::{MigrationOutcome, MigrationReport, migrate_legacy_keys};
pub use schema::{run_migrations, schema_version};
