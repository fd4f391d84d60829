//! Subcommand implementations.
//!
//! Each command writes its human-readable report to `out` and works
//! against the repository traits, so it runs the same against a live
//! server or an in-memory database.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use keyscope_auth::{ApiKeyAuthenticator, RequestContext, ScopeAuthorizer, Subject, required_scope};
use keyscope_core::{Catalog, Operation};
use keyscope_core::models::api_key::CreateApiKey;
use keyscope_core::repository::{
    ApiKeyRepository, GroupRepository, GroupScopeRepository, LegacyApiKeyRepository,
};
use keyscope_db::migrate_legacy_keys;

use crate::manifest::unknown_scopes;

const UNRESTRICTED_REMINDER: &str = "\
Legacy API keys still exist in the legacy store and keep working until
they are revoked or deleted there.
Migrated keys have empty scopes (unrestricted access); assign scopes
with `keyscope create-key` or by updating the key.";

fn check_against_catalog(catalog: Option<&Catalog>, scopes: &[String]) -> Result<()> {
    let Some(catalog) = catalog else {
        return Ok(());
    };
    let unknown = unknown_scopes(catalog, scopes);
    if !unknown.is_empty() {
        bail!("scopes not in catalog: {}", unknown.join(", "));
    }
    Ok(())
}

pub async fn migrate_api_keys<L, K>(
    legacy: &L,
    keys: &K,
    dry_run: bool,
    out: &mut impl Write,
) -> Result<()>
where
    L: LegacyApiKeyRepository,
    K: ApiKeyRepository,
{
    if dry_run {
        writeln!(out, "DRY RUN - no changes will be made\n")?;
    }

    let report = migrate_legacy_keys(legacy, keys, dry_run).await?;
    for entry in &report.entries {
        writeln!(out, "  {entry}")?;
    }
    writeln!(out, "\n{report}")?;

    if !dry_run && report.migrated() > 0 {
        writeln!(out, "\n{UNRESTRICTED_REMINDER}")?;
    }
    Ok(())
}

pub async fn create_key<K: ApiKeyRepository>(
    keys: &K,
    catalog: Option<&Catalog>,
    name: String,
    scopes: Vec<String>,
    expires_in_days: Option<u32>,
    out: &mut impl Write,
) -> Result<()> {
    check_against_catalog(catalog, &scopes)?;

    let input = CreateApiKey {
        name,
        scopes: scopes.into_iter().collect(),
        expires_at: expires_in_days.map(|days| Utc::now() + Duration::days(i64::from(days))),
    };
    let (api_key, plaintext) = keys.create(input).await?;

    writeln!(out, "Created {api_key} with prefix {}", api_key.prefix)?;
    if let Some(expires_at) = api_key.expires_at {
        writeln!(out, "Expires at {}", expires_at.to_rfc3339())?;
    }
    writeln!(out, "\n{plaintext}\n")?;
    writeln!(out, "Store this key now; it cannot be shown again.")?;
    Ok(())
}

pub async fn revoke_key<K: ApiKeyRepository>(
    keys: &K,
    prefix: &str,
    out: &mut impl Write,
) -> Result<()> {
    let api_key = keys
        .get_by_prefix(prefix)
        .await
        .with_context(|| format!("no API key with prefix {prefix}"))?;

    if api_key.revoked {
        writeln!(out, "{api_key} is already revoked")?;
        return Ok(());
    }

    let api_key = keys.revoke(api_key.id).await?;
    writeln!(out, "Revoked {api_key} ({})", api_key.prefix)?;
    Ok(())
}

pub async fn set_group_scopes<G, S>(
    groups: &G,
    group_scopes: &S,
    catalog: Option<&Catalog>,
    group_name: &str,
    scopes: Vec<String>,
    out: &mut impl Write,
) -> Result<()>
where
    G: GroupRepository,
    S: GroupScopeRepository,
{
    check_against_catalog(catalog, &scopes)?;

    let group = groups
        .get_by_name(group_name)
        .await
        .with_context(|| format!("no group named {group_name}"))?;

    let scopes: BTreeSet<String> = scopes.into_iter().collect();
    let binding = group_scopes.set_scopes(group.id, scopes).await?;

    if binding.scopes.is_empty() {
        writeln!(out, "Cleared scopes of group {}; members get no access", group.name)?;
    } else {
        writeln!(out, "Group {} now grants:", group.name)?;
        for scope in &binding.scopes {
            writeln!(out, "  - {scope}")?;
        }
    }
    Ok(())
}

/// Authenticate `plaintext` and, if `target` is given, decide whether the
/// key may perform that request. A rejected key is an error.
pub async fn check_key<K, G>(
    authenticator: &ApiKeyAuthenticator<K>,
    authorizer: &ScopeAuthorizer<G>,
    plaintext: &str,
    target: Option<(&Operation, RequestContext)>,
    out: &mut impl Write,
) -> Result<()>
where
    K: ApiKeyRepository + 'static,
    G: GroupScopeRepository,
{
    if let Some((operation, request)) = &target {
        let route = request.action.as_deref().and_then(|a| operation.route(a));
        if let Some(route) = route.filter(|r| !r.accepts(&request.method)) {
            bail!(
                "route {} on {} does not accept {}",
                route.name,
                operation.handler_type,
                request.method
            );
        }
    }

    let api_key = authenticator.authenticate_key(plaintext).await?;
    writeln!(out, "Authenticated {api_key} ({})", api_key.prefix)?;
    if !api_key.is_unrestricted() {
        for scope in &api_key.scopes {
            writeln!(out, "  - {scope}")?;
        }
    }

    let Some((operation, request)) = target else {
        return Ok(());
    };

    let required = required_scope(operation, &request);
    let decision = authorizer
        .authorize(Subject::ApiKey(&api_key), operation, &request)
        .await?;

    writeln!(
        out,
        "{} {} on {}: requires {}; {decision}",
        request.method,
        request.action.as_deref().unwrap_or("-"),
        operation.handler_type,
        required.as_deref().unwrap_or("nothing"),
    )?;
    Ok(())
}
