//! Periodic close-out of abandoned practice sessions.
//!
//! Open sessions started more than `abandon_after_hours` ago are marked
//! completed in one guarded `UPDATE`. The same tick purges expired
//! shared-cache rows, which are otherwise only overwritten lazily.

use std::time::Duration;

use chrono::Utc;
use examprep_core::practice_session::abandonment_cutoff;
use examprep_core::types::Timestamp;
use examprep_db::repositories::PracticeSessionRepo;
use examprep_db::PgSharedCache;
use examprep_sessions::SessionSettings;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Shortest period between sweeps. `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// What one sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_closed: u64,
    pub cache_rows_purged: u64,
}

/// Run one sweep at `now`.
pub async fn sweep_once(
    pool: &PgPool,
    abandon_after_hours: i64,
    now: Timestamp,
) -> Result<SweepReport, sqlx::Error> {
    let cutoff = abandonment_cutoff(now, abandon_after_hours);
    let sessions_closed = PracticeSessionRepo::complete_abandoned(pool, cutoff).await?;

    let cache_rows_purged = match PgSharedCache::new(pool.clone()).purge_expired().await {
        Ok(purged) => purged,
        Err(e) => {
            tracing::warn!(error = %e, "Session sweep: cache purge failed");
            0
        }
    };

    Ok(SweepReport {
        sessions_closed,
        cache_rows_purged,
    })
}

/// Run the sweep loop until `cancel` is triggered.
///
/// Settings that skipped validation are clamped: the period to
/// [`MIN_SWEEP_INTERVAL`] and the abandon window to the default.
pub async fn run(pool: PgPool, settings: SessionSettings, cancel: CancellationToken) {
    let period = settings.sweep_interval.max(MIN_SWEEP_INTERVAL);
    let abandon_after_hours = if settings.abandon_after_hours > 0 {
        settings.abandon_after_hours
    } else {
        tracing::warn!(
            configured = settings.abandon_after_hours,
            "Session sweep: non-positive abandon window, using the default"
        );
        SessionSettings::default().abandon_after_hours
    };
    tracing::info!(
        abandon_after_hours,
        interval_secs = period.as_secs(),
        "Session sweep job started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(&pool, abandon_after_hours, Utc::now()).await {
                    Ok(report) if report.sessions_closed > 0 || report.cache_rows_purged > 0 => {
                        tracing::info!(
                            sessions_closed = report.sessions_closed,
                            cache_rows_purged = report.cache_rows_purged,
                            "Session sweep: cleaned up"
                        );
                    }
                    Ok(_) => tracing::debug!("Session sweep: nothing to do"),
                    Err(e) => tracing::error!(error = %e, "Session sweep: failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    #[tokio::test]
    async fn zero_interval_does_not_kill_the_job() {
        // Nothing listens on port 1; every sweep fails fast and is logged.
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://examprep@127.0.0.1:1/examprep")
            .unwrap();
        let settings = SessionSettings {
            sweep_interval: Duration::ZERO,
            abandon_after_hours: 0,
            ..SessionSettings::default()
        };
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(pool, settings, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweep job did not stop");
        assert!(joined.is_ok());
    }
}
