//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async data-access
//! methods that accept `&PgPool` (or a transaction connection) as the first
//! argument.

pub mod cache_entry_repo;
pub mod practice_session_repo;
pub mod question_repo;
pub mod quota_repo;
pub mod session_question_repo;

pub use cache_entry_repo::CacheEntryRepo;
pub use practice_session_repo::PracticeSessionRepo;
pub use question_repo::QuestionRepo;
pub use quota_repo::QuotaRepo;
pub use session_question_repo::SessionQuestionRepo;
