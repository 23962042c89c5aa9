//! The shared key/value cache seam.
//!
//! Stateless API instances share nothing in memory, so the lock, the
//! idempotency records, and the question-pool cache all live behind
//! [`SharedCache`]. Implementations must make [`SharedCache::set_if_absent`]
//! and [`SharedCache::delete_if_equals`] atomic with respect to every other
//! caller of the same backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache_keys::{CacheKey, CACHE_SCHEMA_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache payload error: {0}")]
    Codec(String),
}

#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Current value of `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Unconditionally store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store `value` only if `key` is absent or expired. Returns whether the
    /// write happened. Must be a single atomic step.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, CacheError>;

    /// Remove `key`. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove `key` only if its live value equals `expected`. Must be a
    /// single atomic step.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError>;
}

// ---------------------------------------------------------------------------
// Versioned JSON helpers
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    v: u32,
    data: T,
}

fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    serde_json::to_string(&Envelope {
        v: CACHE_SCHEMA_VERSION,
        data: value,
    })
    .map_err(|e| CacheError::Codec(e.to_string()))
}

/// Read a JSON value written by [`put_json`].
///
/// Entries from another schema version, or that no longer decode, are
/// treated as misses so a deploy never trips over stale payloads.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn SharedCache,
    key: &CacheKey,
) -> Result<Option<T>, CacheError> {
    let rendered = key.render();
    let Some(raw) = cache.get(&rendered).await? else {
        return Ok(None);
    };
    match serde_json::from_str::<Envelope<T>>(&raw) {
        Ok(envelope) if envelope.v == CACHE_SCHEMA_VERSION => Ok(Some(envelope.data)),
        Ok(envelope) => {
            tracing::debug!(key = %rendered, version = envelope.v, "Ignoring cache entry from another schema version");
            Ok(None)
        }
        Err(e) => {
            tracing::debug!(key = %rendered, error = %e, "Ignoring undecodable cache entry");
            Ok(None)
        }
    }
}

pub async fn put_json<T: Serialize>(
    cache: &dyn SharedCache,
    key: &CacheKey,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    cache.set(&key.render(), &encode(value)?, ttl).await
}

/// Like [`put_json`] but leaves an existing live entry untouched.
pub async fn put_json_if_absent<T: Serialize>(
    cache: &dyn SharedCache,
    key: &CacheKey,
    value: &T,
    ttl: Duration,
) -> Result<bool, CacheError> {
    cache.set_if_absent(&key.render(), &encode(value)?, ttl).await
}

// ---------------------------------------------------------------------------
// Per-call timeout decorator
// ---------------------------------------------------------------------------

/// Bounds every call on the inner cache by `timeout`.
pub struct TimedCache {
    inner: Arc<dyn SharedCache>,
    timeout: Duration,
}

impl TimedCache {
    pub fn new(inner: Arc<dyn SharedCache>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, CacheError>> + Send,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl SharedCache for TimedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.bounded(self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.bounded(self.inner.set(key, value, ttl)).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        self.bounded(self.inner.set_if_absent(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.bounded(self.inner.delete(key)).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        self.bounded(self.inner.delete_if_equals(key, expected)).await
    }
}

// ---------------------------------------------------------------------------
// In-process implementation
// ---------------------------------------------------------------------------

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Map size below which inserts never trigger a purge.
const MIN_PURGE_AT: usize = 64;

#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
    /// Size at which the next insert drops expired entries first.
    purge_at: usize,
}

impl Entries {
    /// Insert, first purging expired entries once the map has doubled since
    /// the last purge. Keeps memory proportional to live keys.
    fn insert(&mut self, key: &str, entry: Entry, now: Instant) {
        if self.map.len() >= self.purge_at.max(MIN_PURGE_AT) {
            self.purge(now);
            self.purge_at = self.map.len() * 2;
        }
        self.map.insert(key.to_string(), entry);
    }

    fn purge(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.is_live(now));
        before - self.map.len()
    }
}

/// A process-local cache with per-entry expiry.
///
/// Only correct for a single instance (tests, local development). Every
/// operation takes the map lock once, which is what makes the conditional
/// operations atomic.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock_entries()
            .map
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.lock_entries().purge(Instant::now())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        match entries.map.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now + ttl,
        };
        self.lock_entries().insert(key, entry, now);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        if entries.map.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key,
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
            now,
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .lock_entries()
            .map
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        match entries.map.get(key) {
            Some(entry) if entry.is_live(now) && entry.value == expected => {
                entries.map.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
