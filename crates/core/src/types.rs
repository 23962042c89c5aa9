/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar day in UTC, used for daily quota accounting.
pub type UtcDay = chrono::NaiveDate;
