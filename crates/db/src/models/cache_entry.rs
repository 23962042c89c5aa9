//! Shared cache entry model.

use examprep_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `cache_entries` table.
#[derive(Debug, Clone, FromRow)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: Timestamp,
}
