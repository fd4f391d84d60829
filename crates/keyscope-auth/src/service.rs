//! API key authentication.

use std::sync::Arc;

use chrono::{Duration, Utc};
use keyscope_core::error::{KeyscopeError, KeyscopeResult};
use keyscope_core::key;
use keyscope_core::models::api_key::ApiKey;
use keyscope_core::repository::ApiKeyRepository;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::header::parse_authorization;

/// Resolves API keys presented by clients.
///
/// Authentication only establishes *which* key is calling; scope checks
/// happen later in the authorizer.
pub struct ApiKeyAuthenticator<K: ApiKeyRepository> {
    keys: Arc<K>,
    config: AuthConfig,
}

impl<K: ApiKeyRepository + 'static> ApiKeyAuthenticator<K> {
    pub fn new(keys: K, config: AuthConfig) -> Self {
        Self {
            keys: Arc::new(keys),
            config,
        }
    }

    /// Value for the `WWW-Authenticate` response header.
    pub fn www_authenticate(&self) -> &str {
        &self.config.keyword
    }

    /// Authenticate from an `Authorization` header value.
    ///
    /// Returns `Ok(None)` when the header is absent, malformed, or uses a
    /// different scheme: the request carries no API key and falls through
    /// to other authentication. A well-formed header with a bad key is an
    /// error.
    pub async fn authenticate(&self, authorization: Option<&str>) -> KeyscopeResult<Option<ApiKey>> {
        let Some(plaintext) =
            authorization.and_then(|h| parse_authorization(h, &self.config.keyword))
        else {
            return Ok(None);
        };

        self.authenticate_key(plaintext).await.map(Some)
    }

    /// Validate a plaintext key: it must exist, not be revoked, and not
    /// be expired.
    pub async fn authenticate_key(&self, plaintext: &str) -> KeyscopeResult<ApiKey> {
        let hashed = key::hash_key(plaintext);
        let api_key = self.keys.get_by_hash(&hashed).await.map_err(|e| match e {
            KeyscopeError::NotFound { .. } => AuthError::InvalidKey.into(),
            other => other,
        })?;

        if api_key.revoked {
            debug!(prefix = %api_key.prefix, "Rejected revoked API key");
            return Err(AuthError::KeyRevoked.into());
        }

        if api_key.has_expired() {
            debug!(prefix = %api_key.prefix, "Rejected expired API key");
            return Err(AuthError::KeyExpired.into());
        }

        self.record_usage(&api_key);

        Ok(api_key)
    }

    /// Best-effort `last_used_at` update, detached from the request.
    ///
    /// Skipped when tracking is off, when the key was already marked used
    /// within the debounce interval, or when no runtime is available.
    /// Failures are logged and dropped.
    fn record_usage(&self, api_key: &ApiKey) {
        if !self.config.track_last_used {
            return;
        }

        let now = Utc::now();
        if let Some(last) = api_key.last_used_at {
            // A window too large for `Duration` never elapses.
            let within_window = i64::try_from(self.config.last_used_interval_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .is_none_or(|interval| now - last < interval);
            if within_window {
                return;
            }
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let keys = Arc::clone(&self.keys);
        let id = api_key.id;
        runtime.spawn(async move {
            if let Err(e) = keys.touch_last_used(id, now).await {
                warn!(key_id = %id, error = %e, "Failed to record API key usage");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration as StdDuration;

    use chrono::DateTime;
    use keyscope_core::models::api_key::{CreateApiKey, ImportApiKey, UpdateApiKey};
    use keyscope_core::repository::{PaginatedResult, Pagination};
    use parking_lot::Mutex;
    use uuid::Uuid;

    const PLAINTEXT: &str = "0011aabb.secret";

    /// Single-key store that counts `touch_last_used` calls.
    struct OneKey {
        key: ApiKey,
        touches: Arc<Mutex<usize>>,
    }

    fn read_only<T>() -> KeyscopeResult<T> {
        Err(KeyscopeError::Internal("read-only fake".into()))
    }

    impl ApiKeyRepository for OneKey {
        async fn create(&self, _input: CreateApiKey) -> KeyscopeResult<(ApiKey, String)> {
            read_only()
        }

        async fn get_by_id(&self, _id: Uuid) -> KeyscopeResult<ApiKey> {
            Ok(self.key.clone())
        }

        async fn get_by_prefix(&self, _prefix: &str) -> KeyscopeResult<ApiKey> {
            Ok(self.key.clone())
        }

        async fn get_by_hash(&self, hashed_key: &str) -> KeyscopeResult<ApiKey> {
            if hashed_key == self.key.hashed_key {
                Ok(self.key.clone())
            } else {
                Err(KeyscopeError::NotFound {
                    entity: "api_key".into(),
                    id: hashed_key.into(),
                })
            }
        }

        async fn update(&self, _id: Uuid, _input: UpdateApiKey) -> KeyscopeResult<ApiKey> {
            read_only()
        }

        async fn revoke(&self, _id: Uuid) -> KeyscopeResult<ApiKey> {
            read_only()
        }

        async fn delete(&self, _id: Uuid) -> KeyscopeResult<()> {
            read_only()
        }

        async fn list(&self, _pagination: Pagination) -> KeyscopeResult<PaginatedResult<ApiKey>> {
            read_only()
        }

        async fn list_prefixes(&self) -> KeyscopeResult<HashSet<String>> {
            read_only()
        }

        async fn import(&self, _input: ImportApiKey) -> KeyscopeResult<ApiKey> {
            read_only()
        }

        async fn touch_last_used(&self, _id: Uuid, _at: DateTime<Utc>) -> KeyscopeResult<()> {
            *self.touches.lock() += 1;
            Ok(())
        }
    }

    fn authenticator(
        last_used_at: Option<DateTime<Utc>>,
        interval_secs: u64,
    ) -> (ApiKeyAuthenticator<OneKey>, Arc<Mutex<usize>>) {
        let touches = Arc::new(Mutex::new(0));
        let repo = OneKey {
            key: ApiKey {
                id: Uuid::new_v4(),
                name: "ci".into(),
                prefix: "0011aabb".into(),
                hashed_key: key::hash_key(PLAINTEXT),
                scopes: Default::default(),
                revoked: false,
                expires_at: None,
                last_used_at,
                created_at: Utc::now(),
            },
            touches: Arc::clone(&touches),
        };
        let config = AuthConfig {
            track_last_used: true,
            last_used_interval_secs: interval_secs,
            ..AuthConfig::default()
        };
        (ApiKeyAuthenticator::new(repo, config), touches)
    }

    async fn settle() {
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn usage_inside_window_is_not_written() {
        let (auth, touches) = authenticator(Some(Utc::now()), 60);
        auth.authenticate_key(PLAINTEXT).await.unwrap();
        settle().await;
        assert_eq!(*touches.lock(), 0);
    }

    #[tokio::test]
    async fn usage_outside_window_is_written() {
        let (auth, touches) = authenticator(Some(Utc::now() - Duration::minutes(5)), 60);
        auth.authenticate_key(PLAINTEXT).await.unwrap();
        settle().await;
        assert_eq!(*touches.lock(), 1);
    }

    #[tokio::test]
    async fn first_use_is_written() {
        let (auth, touches) = authenticator(None, 60);
        auth.authenticate_key(PLAINTEXT).await.unwrap();
        settle().await;
        assert_eq!(*touches.lock(), 1);
    }

    #[tokio::test]
    async fn oversized_window_never_elapses() {
        for interval in [u64::MAX / 2, u64::MAX] {
            let (auth, touches) = authenticator(Some(Utc::now() - Duration::days(3650)), interval);
            let key = auth.authenticate_key(PLAINTEXT).await.unwrap();
            assert_eq!(key.name, "ci");
            settle().await;
            assert_eq!(*touches.lock(), 0, "interval {interval}");
        }
    }

    #[tokio::test]
    async fn tracking_off_never_writes() {
        let (mut auth, touches) = authenticator(None, 60);
        auth.config.track_last_used = false;
        auth.authenticate_key(PLAINTEXT).await.unwrap();
        settle().await;
        assert_eq!(*touches.lock(), 0);
    }
}
