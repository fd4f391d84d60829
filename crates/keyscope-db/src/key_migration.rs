//! One-time copy of legacy (unscoped) API keys into the scoped store.
//!
//! Keys are matched by prefix: a legacy key whose prefix already exists in
//! the scoped store is skipped. Migrated keys get an empty scope set and
//! therefore stay unrestricted, exactly as they were before.

use std::fmt;

use keyscope_core::error::KeyscopeResult;
use keyscope_core::models::api_key::ImportApiKey;
use keyscope_core::repository::{ApiKeyRepository, LegacyApiKeyRepository};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated,
    /// Dry run: the key would have been migrated.
    WouldMigrate,
    /// Prefix already present in the scoped store.
    Skipped,
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationOutcome::Migrated => "MIGRATED",
            MigrationOutcome::WouldMigrate => "WOULD MIGRATE",
            MigrationOutcome::Skipped => "SKIP",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    pub name: String,
    pub prefix: String,
    pub outcome: MigrationOutcome,
}

impl fmt::Display for MigrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            MigrationOutcome::Skipped => write!(
                f,
                "{}: {} (prefix {} already exists)",
                self.outcome, self.name, self.prefix
            ),
            _ => write!(f, "{}: {} ({})", self.outcome, self.name, self.prefix),
        }
    }
}

/// Per-key results of a migration run, in legacy store order.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub entries: Vec<MigrationEntry>,
}

impl MigrationReport {
    /// Keys migrated, or that would be on a dry run.
    pub fn migrated(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome != MigrationOutcome::Skipped)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == MigrationOutcome::Skipped)
            .count()
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            write!(
                f,
                "Would migrate {} keys, skip {} duplicates",
                self.migrated(),
                self.skipped()
            )
        } else {
            write!(
                f,
                "Migrated {} keys, skipped {} duplicates",
                self.migrated(),
                self.skipped()
            )
        }
    }
}

/// Copy every legacy key whose prefix is not yet taken.
///
/// With `dry_run` set nothing is written; the report carries the same
/// migrate/skip split a real run would produce.
pub async fn migrate_legacy_keys<L, K>(
    legacy: &L,
    keys: &K,
    dry_run: bool,
) -> KeyscopeResult<MigrationReport>
where
    L: LegacyApiKeyRepository,
    K: ApiKeyRepository,
{
    let mut taken = keys.list_prefixes().await?;
    let mut report = MigrationReport {
        dry_run,
        entries: Vec::new(),
    };

    for old in legacy.list().await? {
        let name = old.name.clone();
        let prefix = old.prefix.clone();

        let outcome = if taken.contains(&prefix) {
            MigrationOutcome::Skipped
        } else if dry_run {
            MigrationOutcome::WouldMigrate
        } else {
            keys.import(ImportApiKey::from(old)).await?;
            MigrationOutcome::Migrated
        };

        if outcome != MigrationOutcome::Skipped {
            taken.insert(prefix.clone());
        }
        report.entries.push(MigrationEntry {
            name,
            prefix,
            outcome,
        });
    }

    info!(
        dry_run,
        migrated = report.migrated(),
        skipped = report.skipped(),
        "Legacy API key migration finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: MigrationOutcome) -> MigrationEntry {
        MigrationEntry {
            name: "ci".into(),
            prefix: "0a1b2c3d".into(),
            outcome,
        }
    }

    #[test]
    fn entry_lines() {
        assert_eq!(
            entry(MigrationOutcome::Migrated).to_string(),
            "MIGRATED: ci (0a1b2c3d)"
        );
        assert_eq!(
            entry(MigrationOutcome::WouldMigrate).to_string(),
            "WOULD MIGRATE: ci (0a1b2c3d)"
        );
        assert_eq!(
            entry(MigrationOutcome::Skipped).to_string(),
            "SKIP: ci (prefix 0a1b2c3d already exists)"
        );
    }

    #[test]
    fn summary_counts() {
        let report = MigrationReport {
            dry_run: true,
            entries: vec![
                entry(MigrationOutcome::WouldMigrate),
                entry(MigrationOutcome::Skipped),
                entry(MigrationOutcome::WouldMigrate),
            ],
        };
        assert_eq!(report.migrated(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.to_string(), "Would migrate 2 keys, skip 1 duplicates");
    }
}
