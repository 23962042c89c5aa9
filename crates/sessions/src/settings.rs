//! Coordinator tunables and their environment loading.
//!
//! Values that would stall or crash a running instance (a zero sweep
//! interval, a transaction that cannot finish inside its lock) are rejected
//! at load time; merely malformed values fall back to the default.

use std::str::FromStr;
use std::time::Duration;

use examprep_core::idempotency::DEFAULT_IDEMPOTENCY_TTL;
use examprep_core::lock::DEFAULT_LOCK_TTL;
use examprep_core::practice_session::ABANDON_AFTER_HOURS;
use examprep_core::quota::FREE_DAILY_LIMIT;
use examprep_core::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },

    #[error("TRANSACTION_TIMEOUT_SECS ({transaction_timeout:?}) must be below SESSION_LOCK_TTL_SECS ({lock_ttl:?})")]
    TransactionOutlivesLock {
        transaction_timeout: Duration,
        lock_ttl: Duration,
    },
}

/// Tunables for session creation, loaded from environment variables.
///
/// | Env Var                    | Default |
/// |----------------------------|---------|
/// | `SESSION_LOCK_TTL_SECS`    | `30`    |
/// | `IDEMPOTENCY_TTL_SECS`     | `300`   |
/// | `QUESTION_POOL_TTL_SECS`   | `1800`  |
/// | `QUOTA_CACHE_TTL_SECS`     | `60`    |
/// | `FREE_DAILY_LIMIT`         | `3`     |
/// | `CACHE_TIMEOUT_MS`         | `500`   |
/// | `TRANSACTION_TIMEOUT_SECS` | `15`    |
/// | `RETRY_MAX_ATTEMPTS`       | `3`     |
/// | `RETRY_BASE_DELAY_MS`      | `1000`  |
/// | `RETRY_MAX_DELAY_MS`       | `8000`  |
/// | `ABANDON_AFTER_HOURS`      | `2`     |
/// | `SWEEP_INTERVAL_SECS`      | `600`   |
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub lock_ttl: Duration,
    pub idempotency_ttl: Duration,
    pub question_pool_ttl: Duration,
    pub quota_cache_ttl: Duration,
    pub free_daily_limit: i32,
    /// Bound on every shared-cache call.
    pub cache_timeout: Duration,
    /// Bound on one attempt of the creation transaction. Must be below
    /// `lock_ttl`; retries that would outlive the lock are skipped.
    pub transaction_timeout: Duration,
    pub retry: RetryPolicy,
    pub abandon_after_hours: i64,
    pub sweep_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            idempotency_ttl: DEFAULT_IDEMPOTENCY_TTL,
            question_pool_ttl: Duration::from_secs(30 * 60),
            quota_cache_ttl: Duration::from_secs(60),
            free_daily_limit: FREE_DAILY_LIMIT,
            cache_timeout: Duration::from_millis(500),
            transaction_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            abandon_after_hours: ABANDON_AFTER_HOURS,
            sweep_interval: Duration::from_secs(600),
        }
    }
}

impl SessionSettings {
    /// Load settings from the environment. Missing or malformed values
    /// fall back to the default; out-of-range ones are an error.
    pub fn from_env() -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let settings = Self {
            lock_ttl: secs("SESSION_LOCK_TTL_SECS", defaults.lock_ttl),
            idempotency_ttl: secs("IDEMPOTENCY_TTL_SECS", defaults.idempotency_ttl),
            question_pool_ttl: secs("QUESTION_POOL_TTL_SECS", defaults.question_pool_ttl),
            quota_cache_ttl: secs("QUOTA_CACHE_TTL_SECS", defaults.quota_cache_ttl),
            free_daily_limit: env_or("FREE_DAILY_LIMIT", defaults.free_daily_limit),
            cache_timeout: millis("CACHE_TIMEOUT_MS", defaults.cache_timeout),
            transaction_timeout: secs("TRANSACTION_TIMEOUT_SECS", defaults.transaction_timeout),
            retry: RetryPolicy {
                max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts),
                base_delay: millis("RETRY_BASE_DELAY_MS", defaults.retry.base_delay),
                max_delay: millis("RETRY_MAX_DELAY_MS", defaults.retry.max_delay),
            },
            abandon_after_hours: env_or("ABANDON_AFTER_HOURS", defaults.abandon_after_hours),
            sweep_interval: secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Longest a single creation call can run once it holds the lock,
    /// plus the cache calls around it: the replay lookup before, and the
    /// idempotency write, two invalidations and the release after.
    ///
    /// Dropping a call mid-commit loses its idempotency record, so outer
    /// timeouts must not be shorter than this.
    pub fn creation_time_bound(&self) -> Duration {
        self.lock_ttl + self.cache_timeout * 5
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("SESSION_LOCK_TTL_SECS", self.lock_ttl.is_zero()),
            ("TRANSACTION_TIMEOUT_SECS", self.transaction_timeout.is_zero()),
            ("CACHE_TIMEOUT_MS", self.cache_timeout.is_zero()),
            ("IDEMPOTENCY_TTL_SECS", self.idempotency_ttl.is_zero()),
            ("SWEEP_INTERVAL_SECS", self.sweep_interval.is_zero()),
            ("ABANDON_AFTER_HOURS", self.abandon_after_hours <= 0),
            ("RETRY_MAX_ATTEMPTS", self.retry.max_attempts == 0),
        ];
        if let Some((name, _)) = positive.into_iter().find(|(_, bad)| *bad) {
            return Err(SettingsError::NotPositive { name });
        }
        if self.transaction_timeout >= self.lock_ttl {
            return Err(SettingsError::TransactionOutlivesLock {
                transaction_timeout: self.transaction_timeout,
                lock_ttl: self.lock_ttl,
            });
        }
        Ok(())
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(var = name, value = raw, %default, "Ignoring malformed setting");
        default
    })
}

fn secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(name, default.as_secs()))
}

fn millis(name: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_or(name, default_ms))
}
