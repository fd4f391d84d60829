//! Operator configuration: TOML file, then environment, then flags.

use std::path::Path;

use anyhow::{Context, Result};
use keyscope_auth::AuthConfig;
use keyscope_db::DbConfig;
use serde::Deserialize;

/// Contents of the `--config` file. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub database: DbConfig,
}

/// Connection overrides gathered from flags and `KEYSCOPE_DB_*`
/// variables. Set values replace the file's.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DbOverrides {
    /// SurrealDB WebSocket address
    #[arg(long, global = true, env = "KEYSCOPE_DB_URL")]
    pub db_url: Option<String>,

    #[arg(long, global = true, env = "KEYSCOPE_DB_NAMESPACE")]
    pub db_namespace: Option<String>,

    #[arg(long, global = true, env = "KEYSCOPE_DB_DATABASE")]
    pub db_database: Option<String>,

    #[arg(long, global = true, env = "KEYSCOPE_DB_USERNAME")]
    pub db_username: Option<String>,

    #[arg(long, global = true, env = "KEYSCOPE_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid configuration")
    }

    /// Load `path` if given, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn apply(mut self, overrides: &DbOverrides) -> Self {
        let db = &mut self.database;
        let pairs = [
            (&mut db.url, &overrides.db_url),
            (&mut db.namespace, &overrides.db_namespace),
            (&mut db.database, &overrides.db_database),
            (&mut db.username, &overrides.db_username),
            (&mut db.password, &overrides.db_password),
        ];
        for (field, value) in pairs {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }
        self
    }
}
