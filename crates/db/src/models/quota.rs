//! Per-user daily quota model.

use examprep_core::quota::{PlanTier, QuotaRecord};
use examprep_core::types::{DbId, Timestamp, UtcDay};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_quotas` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserQuota {
    pub user_id: DbId,
    pub plan_tier: String,
    pub plan_limit: Option<i32>,
    pub used_today: i32,
    pub last_usage_day: UtcDay,
    pub total_used: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<UserQuota> for QuotaRecord {
    fn from(row: UserQuota) -> Self {
        QuotaRecord {
            user_id: row.user_id,
            plan_tier: PlanTier::from_db(&row.plan_tier),
            plan_limit: row.plan_limit,
            used_today: row.used_today,
            last_usage_day: row.last_usage_day,
            total_used: row.total_used,
        }
    }
}
