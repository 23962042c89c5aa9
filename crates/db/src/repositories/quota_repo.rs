//! Repository for the `user_quotas` table.

use examprep_core::quota::QuotaRecord;
use examprep_core::types::{DbId, UtcDay};
use sqlx::{PgConnection, PgPool};

use crate::models::quota::UserQuota;

/// Column list for user_quotas queries.
const COLUMNS: &str = "user_id, plan_tier, plan_limit, used_today, last_usage_day, \
    total_used, created_at, updated_at";

/// Provides data access for per-user daily quotas.
pub struct QuotaRepo;

impl QuotaRepo {
    /// Find the quota row for a user.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UserQuota>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_quotas WHERE user_id = $1");
        sqlx::query_as::<_, UserQuota>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a quota row unless the user already has one, then return the
    /// stored row. Concurrent callers converge on a single row.
    pub async fn insert_if_absent(
        pool: &PgPool,
        record: &QuotaRecord,
    ) -> Result<UserQuota, sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_quotas (user_id, plan_tier, plan_limit, used_today, last_usage_day, total_used)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(record.user_id)
        .bind(record.plan_tier.as_str())
        .bind(record.plan_limit)
        .bind(record.used_today)
        .bind(record.last_usage_day)
        .bind(record.total_used)
        .execute(pool)
        .await?;

        let query = format!("SELECT {COLUMNS} FROM user_quotas WHERE user_id = $1");
        sqlx::query_as::<_, UserQuota>(&query)
            .bind(record.user_id)
            .fetch_one(pool)
            .await
    }

    /// Zero today's usage if the row was last used on another day.
    ///
    /// Returns the row after the (possible) reset, or `None` if the user has
    /// no quota row.
    pub async fn reset_daily_usage(
        pool: &PgPool,
        user_id: DbId,
        today: UtcDay,
    ) -> Result<Option<UserQuota>, sqlx::Error> {
        sqlx::query(
            "UPDATE user_quotas
             SET used_today = 0, last_usage_day = $2, updated_at = NOW()
             WHERE user_id = $1 AND last_usage_day <> $2",
        )
        .bind(user_id)
        .bind(today)
        .execute(pool)
        .await?;

        Self::find_by_user(pool, user_id).await
    }

    /// Book one session against `today` as a relative increment.
    ///
    /// A row last used on another day restarts at 1. The statement matches
    /// nothing when the plan limit is already reached, so the caller must
    /// treat `false` as "quota exhausted" and roll back.
    pub async fn increment_usage(
        conn: &mut PgConnection,
        user_id: DbId,
        today: UtcDay,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_quotas
             SET used_today = CASE WHEN last_usage_day = $2 THEN used_today + 1 ELSE 1 END,
                 last_usage_day = $2,
                 total_used = total_used + 1,
                 updated_at = NOW()
             WHERE user_id = $1
               AND (plan_limit IS NULL
                    OR (CASE WHEN last_usage_day = $2 THEN used_today ELSE 0 END) < plan_limit)",
        )
        .bind(user_id)
        .bind(today)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
