//! Test harness: the production router over the in-memory store and cache.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use examprep_core::cache::MemoryCache;
use examprep_core::question::{QuestionRow, SubjectAccess};
use examprep_core::retry::RetryPolicy;
use examprep_sessions::memory::MemoryPracticeStore;
use examprep_sessions::{SessionCreator, SessionSettings};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use examprep_api::config::ServerConfig;
use examprep_api::router::build_app_router;
use examprep_api::state::AppState;

pub const SUBJECT: i64 = 1;
pub const GATED_SUBJECT: i64 = 2;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryPracticeStore>,
    pub cache: Arc<MemoryCache>,
}

fn question(question_id: i64, topic_id: i64) -> QuestionRow {
    QuestionRow {
        question_id,
        topic_id,
        subtopic_id: None,
        marks: 1,
        question_type: "short_answer".into(),
        details: serde_json::json!({
            "prompt": format!("Define term {question_id}"),
            "accepted_answers": ["answer"],
        }),
    }
}

/// The full router with a seeded in-memory store. The pool points at a
/// closed port, so `/health` reports the database as down.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryPracticeStore::new());
    store.add_subject(SubjectAccess {
        subject_id: SUBJECT,
        is_freemium: false,
        free_topic_count: 2,
    });
    store.add_topic(SUBJECT, 10);
    for id in 100..104 {
        store.add_question(SUBJECT, question(id, 10));
    }
    store.add_subject(SubjectAccess {
        subject_id: GATED_SUBJECT,
        is_freemium: true,
        free_topic_count: 1,
    });
    for topic_id in [20, 21] {
        store.add_topic(GATED_SUBJECT, topic_id);
        store.add_question(GATED_SUBJECT, question(topic_id * 10, topic_id));
    }

    let cache = Arc::new(MemoryCache::new());
    let settings = SessionSettings {
        retry: RetryPolicy::immediate(2),
        ..SessionSettings::default()
    };
    let sessions = Arc::new(SessionCreator::new(store.clone(), cache.clone(), settings));

    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://examprep@127.0.0.1:1/examprep")
        .unwrap();

    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        sessions,
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        cache,
    }
}

pub async fn get(app: Router, uri: &str, user_id: Option<i64>) -> Response {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_session(
    app: Router,
    user_id: Option<i64>,
    idempotency_key: Option<&str>,
    body: serde_json::Value,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/sessions")
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    if let Some(key) = idempotency_key {
        builder = builder.header("idempotency-key", key);
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
