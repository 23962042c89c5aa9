//! Deduplication of retried creation requests by client-supplied token.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{self, CacheError, SharedCache};
use crate::cache_keys::CacheKey;
use crate::types::DbId;

/// How long a committed result stays replayable.
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(5 * 60);

/// Longest accepted idempotency token.
pub const MAX_TOKEN_LEN: usize = 128;

/// Check that a client token is usable as a cache-key suffix.
pub fn validate_token(token: &str) -> Result<(), String> {
    if token.is_empty() {
        return Err("idempotency token must not be empty".into());
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(format!(
            "idempotency token must be at most {MAX_TOKEN_LEN} characters"
        ));
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("idempotency token may only contain ASCII letters, digits, '-', '_' and '.'".into());
    }
    Ok(())
}

/// Write-once store of creation results keyed by `(user_id, token)`.
#[derive(Clone)]
pub struct IdempotencyStore {
    cache: Arc<dyn SharedCache>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(cache: Arc<dyn SharedCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        user_id: DbId,
        token: &str,
    ) -> Result<Option<T>, CacheError> {
        cache::get_json(self.cache.as_ref(), &key(user_id, token)).await
    }

    /// Record `result` for the token using the store's TTL.
    ///
    /// A second put for a live key is a no-op and returns `false`.
    pub async fn put<T: Serialize>(
        &self,
        user_id: DbId,
        token: &str,
        result: &T,
    ) -> Result<bool, CacheError> {
        self.put_with_ttl(user_id, token, result, self.ttl).await
    }

    pub async fn put_with_ttl<T: Serialize>(
        &self,
        user_id: DbId,
        token: &str,
        result: &T,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let written =
            cache::put_json_if_absent(self.cache.as_ref(), &key(user_id, token), result, ttl)
                .await?;
        if !written {
            tracing::debug!(user_id, "Idempotency record already present; keeping the first result");
        }
        Ok(written)
    }
}

fn key(user_id: DbId, token: &str) -> CacheKey {
    CacheKey::Idempotency {
        user_id,
        token: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn store() -> IdempotencyStore {
        IdempotencyStore::new(Arc::new(MemoryCache::new()), DEFAULT_IDEMPOTENCY_TTL)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let store = store();
        let before: Option<i64> = store.get(1, "tok").await.unwrap();
        assert_eq!(before, None);

        assert!(store.put(1, "tok", &77i64).await.unwrap());
        let after: Option<i64> = store.get(1, "tok").await.unwrap();
        assert_eq!(after, Some(77));
    }

    #[tokio::test]
    async fn second_put_is_a_no_op() {
        let store = store();
        assert!(store.put(1, "tok", &1i64).await.unwrap());
        assert!(!store.put(1, "tok", &2i64).await.unwrap());
        let value: Option<i64> = store.get(1, "tok").await.unwrap();
        assert_eq!(value, Some(1));
    }

    #[tokio::test]
    async fn tokens_are_scoped_per_user() {
        let store = store();
        store.put(1, "tok", &1i64).await.unwrap();
        let other: Option<i64> = store.get(2, "tok").await.unwrap();
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn records_expire() {
        let store = store();
        store
            .put_with_ttl(1, "tok", &1i64, Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let value: Option<i64> = store.get(1, "tok").await.unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn token_validation() {
        assert!(validate_token("0b7c1f4e-3c1a-4b8e-9a55-2f1d1e0c9a11").is_ok());
        assert!(validate_token("").is_err());
        assert!(validate_token("has space").is_err());
        assert!(validate_token("a:b").is_err());
        assert!(validate_token(&"x".repeat(MAX_TOKEN_LEN + 1)).is_err());
    }
}
