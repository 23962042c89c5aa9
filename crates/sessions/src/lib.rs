//! Practice-session creation.
//!
//! [`SessionCreator`] is the entry point. It combines the per-user
//! [`DistributedLock`](examprep_core::lock::DistributedLock), the
//! [`IdempotencyStore`](examprep_core::idempotency::IdempotencyStore), the
//! [`QuotaLedger`], and the [`QuestionPool`] into one creation flow that is
//! safe under concurrent and retried requests across stateless instances.

pub mod creator;
pub mod memory;
pub mod question_pool;
pub mod quota_ledger;
pub mod settings;

pub use creator::SessionCreator;
pub use question_pool::QuestionPool;
pub use quota_ledger::{QuotaLedger, QuotaStatus};
pub use settings::{SessionSettings, SettingsError};
