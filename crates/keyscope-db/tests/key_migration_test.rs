//! Legacy key migration against in-memory SurrealDB.

use keyscope_core::key;
use keyscope_core::models::api_key::CreateApiKey;
use keyscope_core::models::legacy_api_key::CreateLegacyApiKey;
use keyscope_core::repository::{ApiKeyRepository, LegacyApiKeyRepository, Pagination};
use keyscope_db::repository::{SurrealApiKeyRepository, SurrealLegacyApiKeyRepository};
use keyscope_db::{MigrationOutcome, migrate_legacy_keys};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Two legacy keys, one of which shares its prefix with a key already in
/// the scoped store.
async fn setup() -> (
    SurrealLegacyApiKeyRepository<Db>,
    SurrealApiKeyRepository<Db>,
    String,
) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    keyscope_db::run_migrations(&db).await.unwrap();

    let legacy = SurrealLegacyApiKeyRepository::new(db.clone());
    let keys = SurrealApiKeyRepository::new(db);

    let (existing, _) = keys
        .create(CreateApiKey {
            name: "already-scoped".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    legacy
        .create(CreateLegacyApiKey {
            name: "billing".into(),
            prefix: "1a2b3c4d".into(),
            hashed_key: key::hash_key("1a2b3c4d.secret"),
            revoked: false,
            expires_at: None,
        })
        .await
        .unwrap();
    legacy
        .create(CreateLegacyApiKey {
            name: "duplicate".into(),
            prefix: existing.prefix.clone(),
            hashed_key: key::hash_key("dup.secret"),
            revoked: false,
            expires_at: None,
        })
        .await
        .unwrap();

    (legacy, keys, existing.prefix)
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let (legacy, keys, _) = setup().await;

    let report = migrate_legacy_keys(&legacy, &keys, true).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.migrated(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.entries[0].outcome, MigrationOutcome::WouldMigrate);
    assert_eq!(keys.list(Pagination::default()).await.unwrap().total, 1);
}

#[tokio::test]
async fn migration_copies_new_keys_as_unrestricted() {
    let (legacy, keys, existing_prefix) = setup().await;

    let dry = migrate_legacy_keys(&legacy, &keys, true).await.unwrap();
    let report = migrate_legacy_keys(&legacy, &keys, false).await.unwrap();

    assert_eq!(report.migrated(), dry.migrated());
    assert_eq!(report.skipped(), dry.skipped());

    let skipped = report
        .entries
        .iter()
        .find(|e| e.outcome == MigrationOutcome::Skipped)
        .unwrap();
    assert_eq!(skipped.prefix, existing_prefix);

    let migrated = keys.get_by_prefix("1a2b3c4d").await.unwrap();
    assert!(migrated.is_unrestricted());
    assert_eq!(migrated.hashed_key, key::hash_key("1a2b3c4d.secret"));

    let originals = legacy.list().await.unwrap();
    let original = originals.iter().find(|k| k.prefix == "1a2b3c4d").unwrap();
    assert_eq!(migrated.id, original.id);

    // Running again finds everything in place.
    let rerun = migrate_legacy_keys(&legacy, &keys, false).await.unwrap();
    assert_eq!(rerun.migrated(), 0);
    assert_eq!(rerun.skipped(), 2);
}
