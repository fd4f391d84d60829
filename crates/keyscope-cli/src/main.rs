//! Operator tooling for scoped API keys.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyscope_auth::{ApiKeyAuthenticator, RequestContext, ScopeAuthorizer};
use keyscope_core::Method;
use keyscope_db::repository::{
    SurrealApiKeyRepository, SurrealGroupRepository, SurrealGroupScopeRepository,
    SurrealLegacyApiKeyRepository,
};
use keyscope_db::DbManager;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod listing;
mod manifest;

use config::{Config, DbOverrides};
use manifest::Manifest;

#[derive(Parser)]
#[command(name = "keyscope")]
#[command(about = "Scoped API key administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, env = "KEYSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(flatten)]
    db: DbOverrides,
}

#[derive(Subcommand)]
enum Commands {
    /// List every scope the operations manifest publishes
    ListScopes {
        /// Operations manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Print the grouping as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy legacy API keys into the scoped store
    MigrateApiKeys {
        /// Show what would be migrated without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Issue a new API key and print it once
    CreateKey {
        #[arg(short, long)]
        name: String,

        /// Scope to grant; repeat for several. None means unrestricted.
        #[arg(short, long = "scope")]
        scopes: Vec<String>,

        #[arg(long)]
        expires_in_days: Option<u32>,

        /// Reject scopes this manifest does not publish
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Revoke an API key by prefix
    RevokeKey { prefix: String },

    /// Authenticate a plaintext key and optionally test one request
    CheckKey {
        /// Full plaintext key
        key: String,

        /// Operation (handler type or resource name) to test against
        #[arg(short, long, requires = "manifest")]
        operation: Option<String>,

        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Fine-grained action (`list`, `destroy`, a custom route name)
        #[arg(long)]
        action: Option<String>,

        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Replace the scopes a group grants its members
    SetGroupScopes {
        group: String,

        /// Scope to grant; repeat for several. None clears the binding.
        #[arg(short, long = "scope")]
        scopes: Vec<String>,

        /// Reject scopes this manifest does not publish
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("keyscope=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Option<keyscope_core::Catalog>> {
    path.map(|p| Manifest::load(p).map(|m| m.catalog()))
        .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let mut stdout = io::stdout().lock();

    // Catalog listing needs no database.
    if let Commands::ListScopes { manifest, json } = &cli.command {
        let catalog = Manifest::load(manifest)?.catalog();
        if *json {
            serde_json::to_writer_pretty(&mut stdout, &catalog.grouped_by_declared_module())?;
            writeln!(stdout)?;
        } else {
            write!(stdout, "{}", listing::render(&catalog))?;
        }
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?.apply(&cli.db);
    let manager = DbManager::open(&config.database).await?;
    let db = manager.client().clone();

    let keys = SurrealApiKeyRepository::new(db.clone());

    match cli.command {
        Commands::ListScopes { .. } => {}

        Commands::MigrateApiKeys { dry_run } => {
            let legacy = SurrealLegacyApiKeyRepository::new(db.clone());
            commands::migrate_api_keys(&legacy, &keys, dry_run, &mut stdout).await?;
        }

        Commands::CreateKey {
            name,
            scopes,
            expires_in_days,
            manifest,
        } => {
            let catalog = load_catalog(manifest.as_ref())?;
            commands::create_key(
                &keys,
                catalog.as_ref(),
                name,
                scopes,
                expires_in_days,
                &mut stdout,
            )
            .await?;
        }

        Commands::RevokeKey { prefix } => {
            commands::revoke_key(&keys, &prefix, &mut stdout).await?;
        }

        Commands::CheckKey {
            key,
            operation,
            method,
            action,
            manifest,
        } => {
            let manifest = manifest.as_deref().map(Manifest::load).transpose()?;
            let operation = match (&manifest, operation) {
                (Some(m), Some(name)) => Some(
                    m.find(&name)
                        .with_context(|| format!("no operation {name} in manifest"))?,
                ),
                _ => None,
            };
            let target = operation.map(|op| {
                let mut request = RequestContext::new(Method::parse(&method));
                request.action = action;
                (op, request)
            });

            let authenticator = ApiKeyAuthenticator::new(keys, config.auth);
            let authorizer = ScopeAuthorizer::new(SurrealGroupScopeRepository::new(db.clone()));
            commands::check_key(&authenticator, &authorizer, &key, target, &mut stdout).await?;
        }

        Commands::SetGroupScopes {
            group,
            scopes,
            manifest,
        } => {
            let catalog = load_catalog(manifest.as_ref())?;
            let groups = SurrealGroupRepository::new(db.clone());
            let group_scopes = SurrealGroupScopeRepository::new(db.clone());
            commands::set_group_scopes(
                &groups,
                &group_scopes,
                catalog.as_ref(),
                &group,
                scopes,
                &mut stdout,
            )
            .await?;
        }
    }

    info!("Done");
    Ok(())
}
