//! Domain types and coordination primitives for practice-session creation.
//!
//! This crate has zero internal deps so it can be used by the storage
//! layer, the session coordinator, and the HTTP binding alike. Anything that
//! talks to a real backend (Postgres, a shared cache) does so through the
//! [`cache::SharedCache`] and [`storage::PracticeStore`] traits.

pub mod cache;
pub mod cache_keys;
pub mod error;
pub mod idempotency;
pub mod lock;
pub mod practice_session;
pub mod question;
pub mod quota;
pub mod retry;
pub mod selection;
pub mod storage;
pub mod types;
