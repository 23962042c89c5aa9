//! Bounded exponential-backoff retry for storage operations.
//!
//! Failures are split into transient (connection exhaustion, dropped or
//! unestablished connections) and fatal (everything else). Only transient
//! failures are retried; a fatal one is returned on first occurrence.
//! The helper knows nothing about what the operation does, so the same
//! policy wraps both the creation transaction and plain reads.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Classification hook for errors that can be retried.
pub trait Transient {
    /// `true` when the same operation may succeed if simply tried again.
    fn is_transient(&self) -> bool;
}

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// The error that ended a retried operation, with the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
}

impl RetryPolicy {
    /// A policy that never sleeps. Handy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Doubles from [`RetryPolicy::base_delay`] and is clamped to
    /// [`RetryPolicy::max_delay`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `operation` is only used to label log lines.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, RetryFailure<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_inner(operation, None, op).await
    }

    /// Like [`RetryPolicy::run`], but no retry is started unless the
    /// backoff plus `attempt_budget` still ends before `deadline`. When the
    /// next attempt would not fit, the last transient error is returned.
    ///
    /// The first attempt always runs; callers bound it themselves.
    pub async fn run_until<T, E, F, Fut>(
        &self,
        operation: &str,
        deadline: Instant,
        attempt_budget: Duration,
        op: F,
    ) -> Result<T, RetryFailure<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_inner(operation, Some((deadline, attempt_budget)), op)
            .await
    }

    async fn run_inner<T, E, F, Fut>(
        &self,
        operation: &str,
        limit: Option<(Instant, Duration)>,
        mut op: F,
    ) -> Result<T, RetryFailure<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    if let Some((deadline, budget)) = limit {
                        if Instant::now() + delay + budget > deadline {
                            tracing::error!(
                                operation,
                                attempt,
                                error = %error,
                                "No time left for another attempt, giving up",
                            );
                            return Err(RetryFailure {
                                error,
                                attempts: attempt,
                            });
                        }
                    }
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    if error.is_transient() {
                        tracing::error!(operation, attempt, error = %error, "Retries exhausted");
                    }
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}
