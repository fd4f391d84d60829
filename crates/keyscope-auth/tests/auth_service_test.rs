//! Integration tests for API key authentication using in-memory SurrealDB.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use keyscope_auth::{ApiKeyAuthenticator, AuthConfig};
use keyscope_core::error::KeyscopeError;
use keyscope_core::models::api_key::{CreateApiKey, UpdateApiKey};
use keyscope_core::repository::ApiKeyRepository;
use keyscope_db::repository::SurrealApiKeyRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> SurrealApiKeyRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    keyscope_db::run_migrations(&db).await.unwrap();
    SurrealApiKeyRepository::new(db)
}

fn reason(err: &KeyscopeError) -> &str {
    match err {
        KeyscopeError::AuthenticationFailed { reason } => reason,
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn valid_header_authenticates() {
    let keys = setup().await;
    let (api_key, plaintext) = keys.create(CreateApiKey::default()).await.unwrap();
    let auth = ApiKeyAuthenticator::new(keys, AuthConfig::default());

    let header = format!("Api-Key {plaintext}");
    let found = auth.authenticate(Some(header.as_str())).await.unwrap().unwrap();
    assert_eq!(found.id, api_key.id);

    // Keyword matching is case-insensitive.
    let header = format!("api-key {plaintext}");
    assert!(auth.authenticate(Some(header.as_str())).await.unwrap().is_some());
}

#[tokio::test]
async fn absent_or_foreign_header_is_not_an_error() {
    let keys = setup().await;
    let auth = ApiKeyAuthenticator::new(keys, AuthConfig::default());

    assert!(auth.authenticate(None).await.unwrap().is_none());
    assert!(auth.authenticate(Some("Bearer abc.def")).await.unwrap().is_none());
    assert!(auth.authenticate(Some("Api-Key")).await.unwrap().is_none());
    assert_eq!(auth.www_authenticate(), "Api-Key");
}

#[tokio::test]
async fn unknown_key_is_invalid() {
    let keys = setup().await;
    let auth = ApiKeyAuthenticator::new(keys, AuthConfig::default());

    let err = auth
        .authenticate(Some("Api-Key 00000000.not-a-real-secret"))
        .await
        .unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(reason(&err), "invalid API key");
}

#[tokio::test]
async fn revoked_key_fails_authentication_regardless_of_scopes() {
    let keys = setup().await;
    let (api_key, plaintext) = keys.create(CreateApiKey::default()).await.unwrap();
    keys.revoke(api_key.id).await.unwrap();
    let auth = ApiKeyAuthenticator::new(keys, AuthConfig::default());

    let err = auth.authenticate_key(&plaintext).await.unwrap_err();
    assert!(err.is_authentication());
    assert!(!err.is_authorization());
    assert_eq!(reason(&err), "API key has been revoked");
}

#[tokio::test]
async fn expired_key_is_rejected() {
    let keys = setup().await;
    let (api_key, plaintext) = keys
        .create(CreateApiKey {
            name: "short-lived".into(),
            expires_at: Some(Utc::now() + Duration::days(1)),
            ..Default::default()
        })
        .await
        .unwrap();

    keys.update(
        api_key.id,
        UpdateApiKey {
            expires_at: Some(Some(Utc::now() - Duration::minutes(1))),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let auth = ApiKeyAuthenticator::new(keys, AuthConfig::default());
    let err = auth.authenticate_key(&plaintext).await.unwrap_err();
    assert_eq!(reason(&err), "API key has expired");
}

#[tokio::test]
async fn custom_keyword() {
    let keys = setup().await;
    let (_, plaintext) = keys.create(CreateApiKey::default()).await.unwrap();
    let auth = ApiKeyAuthenticator::new(
        keys,
        AuthConfig {
            keyword: "Token".into(),
            ..Default::default()
        },
    );

    let header = format!("Token {plaintext}");
    assert!(auth.authenticate(Some(header.as_str())).await.unwrap().is_some());

    let header = format!("Api-Key {plaintext}");
    assert!(auth.authenticate(Some(header.as_str())).await.unwrap().is_none());
}

#[tokio::test]
async fn last_used_is_not_written_by_default() {
    let keys = setup().await;
    let (api_key, plaintext) = keys.create(CreateApiKey::default()).await.unwrap();
    let auth = ApiKeyAuthenticator::new(keys.clone(), AuthConfig::default());

    auth.authenticate_key(&plaintext).await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    assert!(keys.get_by_id(api_key.id).await.unwrap().last_used_at.is_none());
}

#[tokio::test]
async fn last_used_is_tracked_when_enabled() {
    let keys = setup().await;
    let (api_key, plaintext) = keys.create(CreateApiKey::default()).await.unwrap();
    let auth = ApiKeyAuthenticator::new(
        keys.clone(),
        AuthConfig {
            track_last_used: true,
            ..Default::default()
        },
    );

    auth.authenticate_key(&plaintext).await.unwrap();

    // The write is detached from authentication; poll for it.
    let mut last_used = None;
    for _ in 0..50 {
        last_used = keys.get_by_id(api_key.id).await.unwrap().last_used_at;
        if last_used.is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    assert!(last_used.is_some(), "last_used_at was never recorded");
}
