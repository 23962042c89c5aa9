//! Daily usage quota: plan tiers, day rollover, and limit evaluation.
//!
//! All functions here are pure. Persistence of the rollover and the atomic
//! increment is the storage layer's job; the session coordinator decides
//! when to call them.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp, UtcDay};

/// Sessions per day granted to a user with no paid plan.
pub const FREE_DAILY_LIMIT: i32 = 3;

// ---------------------------------------------------------------------------
// Plan tiers
// ---------------------------------------------------------------------------

/// Subscription tier as far as quota and content gating are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
        }
    }

    /// Parse the stored text form. Unknown values fall back to `Free`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "premium" => PlanTier::Premium,
            _ => PlanTier::Free,
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Per-user daily usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub user_id: DbId,
    pub plan_tier: PlanTier,
    /// `None` means unlimited.
    pub plan_limit: Option<i32>,
    pub used_today: i32,
    pub last_usage_day: UtcDay,
    pub total_used: i64,
}

impl QuotaRecord {
    /// A brand-new free-tier record with nothing used yet.
    pub fn new_free(user_id: DbId, daily_limit: i32, today: UtcDay) -> Self {
        Self {
            user_id,
            plan_tier: PlanTier::Free,
            plan_limit: Some(daily_limit),
            used_today: 0,
            last_usage_day: today,
            total_used: 0,
        }
    }

    pub fn is_premium(&self) -> bool {
        self.plan_tier == PlanTier::Premium
    }
}

/// Zero `used_today` when the record was last touched on another UTC day.
///
/// Returns `true` if the record changed and the caller must persist it.
pub fn reset_if_new_day(record: &mut QuotaRecord, now: Timestamp) -> bool {
    let today = now.date_naive();
    if record.last_usage_day == today {
        return false;
    }
    record.used_today = 0;
    record.last_usage_day = today;
    true
}

/// The next UTC midnight strictly after `now`.
pub fn next_reset(now: Timestamp) -> Timestamp {
    now.date_naive()
        .succ_opt()
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Why a user cannot start another session today.
///
/// The fields are structured so callers can localize the message; the
/// `Display` impl is the default English rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDenial {
    pub limit: i32,
    pub resets_at: Timestamp,
}

impl fmt::Display for QuotaDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.limit == 1 { "session" } else { "sessions" };
        write!(
            f,
            "Daily limit of {} practice {noun} reached. Resets at {}.",
            self.limit,
            self.resets_at.to_rfc3339()
        )
    }
}

/// Outcome of checking a quota record against its plan limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEvaluation {
    pub can_take: bool,
    /// `None` for unlimited plans.
    pub remaining: Option<i32>,
    pub reason: Option<QuotaDenial>,
}

/// Evaluate `record` at `now`. The record is expected to be rolled over
/// already (see [`reset_if_new_day`]).
pub fn evaluate(record: &QuotaRecord, now: Timestamp) -> QuotaEvaluation {
    let Some(limit) = record.plan_limit else {
        return QuotaEvaluation {
            can_take: true,
            remaining: None,
            reason: None,
        };
    };

    let remaining = (limit - record.used_today).max(0);
    let can_take = remaining > 0;
    QuotaEvaluation {
        can_take,
        remaining: Some(remaining),
        reason: (!can_take).then(|| QuotaDenial {
            limit,
            resets_at: next_reset(now),
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> UtcDay {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn free_record(used_today: i32, last_usage_day: UtcDay) -> QuotaRecord {
        QuotaRecord {
            used_today,
            ..QuotaRecord::new_free(7, FREE_DAILY_LIMIT, last_usage_day)
        }
    }

    #[test]
    fn yesterday_usage_is_reset_before_evaluation() {
        let now = at(2026, 10, 17, 9);
        let mut record = free_record(3, day(2026, 10, 16));

        assert!(reset_if_new_day(&mut record, now));
        assert_eq!(record.used_today, 0);
        assert_eq!(record.last_usage_day, day(2026, 10, 17));

        let eval = evaluate(&record, now);
        assert!(eval.can_take);
        assert_eq!(eval.remaining, Some(3));
    }

    #[test]
    fn same_day_is_not_reset() {
        let now = at(2026, 10, 17, 23);
        let mut record = free_record(2, day(2026, 10, 17));
        assert!(!reset_if_new_day(&mut record, now));
        assert_eq!(record.used_today, 2);
    }

    #[test]
    fn exhausted_free_plan_reports_limit_and_next_midnight() {
        let now = at(2026, 10, 17, 15);
        let record = free_record(3, day(2026, 10, 17));

        let eval = evaluate(&record, now);
        assert!(!eval.can_take);
        assert_eq!(eval.remaining, Some(0));

        let reason = eval.reason.unwrap();
        assert_eq!(reason.limit, 3);
        assert_eq!(reason.resets_at, at(2026, 10, 18, 0));

        let message = reason.to_string();
        assert!(message.contains('3'));
        assert!(message.contains("2026-10-18T00:00:00+00:00"));
    }

    #[test]
    fn over_limit_remaining_is_clamped_to_zero() {
        let record = free_record(5, day(2026, 10, 17));
        let eval = evaluate(&record, at(2026, 10, 17, 1));
        assert_eq!(eval.remaining, Some(0));
    }

    #[test]
    fn unlimited_plan_can_always_take() {
        let record = QuotaRecord {
            plan_tier: PlanTier::Premium,
            plan_limit: None,
            used_today: 500,
            ..free_record(0, day(2026, 10, 17))
        };
        let eval = evaluate(&record, at(2026, 10, 17, 1));
        assert!(eval.can_take);
        assert_eq!(eval.remaining, None);
        assert!(eval.reason.is_none());
    }

    #[test]
    fn next_reset_rolls_over_month_end() {
        assert_eq!(next_reset(at(2026, 12, 31, 23)), at(2027, 1, 1, 0));
    }

    #[test]
    fn singular_limit_message() {
        let denial = QuotaDenial {
            limit: 1,
            resets_at: at(2026, 10, 18, 0),
        };
        assert!(denial.to_string().starts_with("Daily limit of 1 practice session reached."));
    }

    #[test]
    fn plan_tier_round_trips_through_db_text() {
        assert_eq!(PlanTier::from_db(PlanTier::Premium.as_str()), PlanTier::Premium);
        assert_eq!(PlanTier::from_db("enterprise"), PlanTier::Free);
    }
}
