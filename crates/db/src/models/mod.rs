//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and, where rows are inserted, a create DTO.

pub mod cache_entry;
pub mod practice_session;
pub mod question;
pub mod quota;
pub mod session_question;
