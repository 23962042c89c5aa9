//! Per-key mutual exclusion across stateless instances.
//!
//! A lock is a shared-cache entry holding a random holder token. Acquiring
//! is one atomic set-if-absent and never waits: a held lock is reported as
//! busy and the caller decides whether to come back later. Releasing is a
//! compare-and-delete on the holder token, so a holder whose entry already
//! expired (and was taken by someone else) cannot release the new holder's
//! lock. Expiry is the only way a crashed holder's lock goes away.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cache::{CacheError, SharedCache};
use crate::cache_keys::CacheKey;

/// Default lifetime of a lock entry. Must exceed the guarded work.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct DistributedLock {
    cache: Arc<dyn SharedCache>,
}

impl DistributedLock {
    pub fn new(cache: Arc<dyn SharedCache>) -> Self {
        Self { cache }
    }

    /// Try to take the lock for `key`. `Ok(None)` means someone else holds it.
    pub async fn acquire(
        &self,
        key: &CacheKey,
        ttl: Duration,
    ) -> Result<Option<LockGuard>, CacheError> {
        let rendered = key.render();
        let token = Uuid::new_v4().to_string();

        if !self.cache.set_if_absent(&rendered, &token, ttl).await? {
            tracing::debug!(key = %rendered, "Lock busy");
            return Ok(None);
        }

        tracing::debug!(key = %rendered, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
        Ok(Some(LockGuard {
            cache: Arc::clone(&self.cache),
            key: rendered,
            token,
            released: false,
        }))
    }

    /// Compare-and-delete release by raw token.
    ///
    /// Returns `false` when the entry is gone or belongs to another holder;
    /// that is logged but is not an error.
    pub async fn release(&self, key: &CacheKey, token: &str) -> Result<bool, CacheError> {
        release_token(self.cache.as_ref(), &key.render(), token).await
    }
}

async fn release_token(
    cache: &dyn SharedCache,
    key: &str,
    token: &str,
) -> Result<bool, CacheError> {
    let removed = cache.delete_if_equals(key, token).await?;
    if removed {
        tracing::debug!(key, "Lock released");
    } else {
        tracing::warn!(key, "Lock expired before release; another holder may own it now");
    }
    Ok(removed)
}

/// Proof of holding a lock.
///
/// Call [`LockGuard::release`] on every exit path. A guard dropped without
/// being released (panic, cancelled future) schedules the same
/// compare-and-delete on the current Tokio runtime; if there is none the
/// entry simply expires.
pub struct LockGuard {
    cache: Arc<dyn SharedCache>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn release(mut self) -> Result<bool, CacheError> {
        self.released = true;
        release_token(self.cache.as_ref(), &self.key, &self.token).await
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %self.key, "Lock guard dropped outside a runtime; waiting for expiry");
            return;
        };
        let cache = Arc::clone(&self.cache);
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        tracing::warn!(key = %key, "Lock guard dropped without release; releasing in background");
        handle.spawn(async move {
            if let Err(e) = release_token(cache.as_ref(), &key, &token).await {
                tracing::error!(key = %key, error = %e, "Background lock release failed");
            }
        });
    }
}
