//! Postgres-backed [`SharedCache`].
//!
//! Every API instance talks to the same `cache_entries` table, so the
//! conditional statements in [`CacheEntryRepo`] give cluster-wide atomic
//! set-if-absent and compare-and-delete.

use std::time::Duration;

use async_trait::async_trait;
use examprep_core::cache::{CacheError, SharedCache};
use sqlx::PgPool;

use crate::repositories::CacheEntryRepo;

#[derive(Clone)]
pub struct PgSharedCache {
    pool: PgPool,
}

impl PgSharedCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        CacheEntryRepo::purge_expired(&self.pool)
            .await
            .map_err(backend)
    }
}

fn backend(err: sqlx::Error) -> CacheError {
    CacheError::Backend(err.to_string())
}

fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl SharedCache for PgSharedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entry = CacheEntryRepo::find_live(&self.pool, key)
            .await
            .map_err(backend)?;
        Ok(entry.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        CacheEntryRepo::upsert(&self.pool, key, value, ttl_ms(ttl))
            .await
            .map_err(backend)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        CacheEntryRepo::insert_if_absent(&self.pool, key, value, ttl_ms(ttl))
            .await
            .map_err(backend)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        CacheEntryRepo::delete(&self.pool, key)
            .await
            .map_err(backend)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        CacheEntryRepo::delete_if_value(&self.pool, key, expected)
            .await
            .map_err(backend)
    }
}
