//! Store connection for the keyscope tables.

use std::fmt;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::{run_migrations, schema_version};

/// Where the key and group-scope tables live, read from the `[database]`
/// config table. Missing fields fall back to a local development server.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// `host:port` of the WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "keyscope".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

// Config is logged at startup; keep the password out of it.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Live connection to the keyscope store.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Sign in as root and select the configured namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Opening keyscope store"
        );

        let db = Surreal::new::<Ws>(config.url.as_str()).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace).use_db(&config.database).await?;

        Ok(Self { db })
    }

    /// [`connect`](Self::connect), then bring the schema up to date.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        let manager = Self::connect(config).await?;
        run_migrations(&manager.db).await?;
        info!(schema_version = schema_version(), "keyscope store ready");
        Ok(manager)
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
