//! Abandonment sweep against a real database.
//!
//! Needs a reachable PostgreSQL server via `DATABASE_URL`; run with
//! `cargo test -p examprep-api -- --ignored`.

use chrono::{Duration, Utc};
use examprep_api::background::session_sweep::{sweep_once, SweepReport};
use examprep_core::types::Timestamp;
use examprep_db::repositories::PracticeSessionRepo;
use sqlx::PgPool;

async fn seed_subject(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO subjects (name, is_freemium, free_topic_count) VALUES ('Physics', false, 2) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn open_session(pool: &PgPool, user_id: i64, subject_id: i64, start_time: Timestamp) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO practice_sessions (user_id, subject_id, total_questions, max_score, start_time)
         VALUES ($1, $2, 5, 5, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(subject_id)
    .bind(start_time)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn sweep_closes_only_stale_open_sessions(pool: PgPool) {
    let subject_id = seed_subject(&pool).await;
    let now = Utc::now();
    let stale = open_session(&pool, 7, subject_id, now - Duration::hours(3)).await;
    let fresh = open_session(&pool, 7, subject_id, now - Duration::minutes(30)).await;

    let report = sweep_once(&pool, 2, now).await.unwrap();
    assert_eq!(report.sessions_closed, 1);

    let sessions = PracticeSessionRepo::list_by_user(&pool, 7, 10).await.unwrap();
    let closed = sessions.iter().find(|s| s.id == stale).unwrap();
    assert!(closed.is_completed);
    assert!(closed.end_time.is_some());
    let open = sessions.iter().find(|s| s.id == fresh).unwrap();
    assert!(!open.is_completed);
    assert!(open.end_time.is_none());

    // A second pass has nothing left to close.
    let again = sweep_once(&pool, 2, now).await.unwrap();
    assert_eq!(again.sessions_closed, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn sweep_purges_expired_cache_rows(pool: PgPool) {
    sqlx::query(
        "INSERT INTO cache_entries (key, value, expires_at) VALUES
            ('gone', 'x', NOW() - INTERVAL '1 minute'),
            ('live', 'y', NOW() + INTERVAL '1 hour')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let report = sweep_once(&pool, 2, Utc::now()).await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            sessions_closed: 0,
            cache_rows_purged: 1,
        }
    );

    let left: Vec<String> = sqlx::query_scalar("SELECT key FROM cache_entries")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(left, vec!["live".to_string()]);
}
