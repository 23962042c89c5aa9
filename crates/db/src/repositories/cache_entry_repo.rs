//! Repository for the `cache_entries` table.
//!
//! Expired rows are invisible to reads and are overwritten in place by
//! conditional writes, so correctness never depends on the purge running.
//! Expiry is computed from the database clock so API instances with
//! skewed clocks still agree on it.

use sqlx::PgPool;

use crate::models::cache_entry::CacheEntry;

/// Provides the key/value primitives behind the Postgres shared cache.
pub struct CacheEntryRepo;

impl CacheEntryRepo {
    /// Live value for `key`.
    pub async fn find_live(pool: &PgPool, key: &str) -> Result<Option<CacheEntry>, sqlx::Error> {
        sqlx::query_as::<_, CacheEntry>(
            "SELECT key, value, expires_at FROM cache_entries
             WHERE key = $1 AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    /// Upsert `key` unconditionally.
    pub async fn upsert(
        pool: &PgPool,
        key: &str,
        value: &str,
        ttl_ms: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at)
             VALUES ($1, $2, NOW() + $3::double precision * INTERVAL '1 millisecond')
             ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(ttl_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Write `key` only if it is absent or expired, in one statement.
    /// Returns `true` if this call wrote the row.
    pub async fn insert_if_absent(
        pool: &PgPool,
        key: &str,
        value: &str,
        ttl_ms: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at)
             VALUES ($1, $2, NOW() + $3::double precision * INTERVAL '1 millisecond')
             ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
             WHERE cache_entries.expires_at <= NOW()",
        )
        .bind(key)
        .bind(value)
        .bind(ttl_ms)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete `key`. Returns `true` if a live row was removed.
    pub async fn delete(pool: &PgPool, key: &str) -> Result<bool, sqlx::Error> {
        let removed = sqlx::query_scalar::<_, bool>(
            "DELETE FROM cache_entries WHERE key = $1 RETURNING expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(pool)
        .await?;
        Ok(removed.unwrap_or(false))
    }

    /// Delete `key` only if its live value equals `expected`.
    pub async fn delete_if_value(
        pool: &PgPool,
        key: &str,
        expected: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM cache_entries
             WHERE key = $1 AND value = $2 AND expires_at > NOW()",
        )
        .bind(key)
        .bind(expected)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove expired rows. Returns the number deleted.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
