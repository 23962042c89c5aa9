//! Classification of sqlx errors into transient and fatal storage errors.

use examprep_core::storage::StorageError;

/// SQLSTATE codes that mean "the connection, not the statement, failed".
///
/// - `53300` too_many_connections
/// - `57P01` admin_shutdown, `57P02` crash_shutdown, `57P03` cannot_connect_now
/// - `08xxx` connection exceptions (failure, does not exist, unable to
///   establish, rejected)
const TRANSIENT_SQLSTATES: &[&str] = &[
    "53300", "57P01", "57P02", "57P03", "08000", "08001", "08003", "08004", "08006",
];

/// Whether a Postgres SQLSTATE code is worth retrying.
pub fn is_transient_sqlstate(code: &str) -> bool {
    TRANSIENT_SQLSTATES.contains(&code)
}

/// Whether a sqlx error is a connection-level failure that may clear on retry.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        // No pooled connection became free in time, or the socket broke.
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| is_transient_sqlstate(code.as_ref())),
        _ => false,
    }
}

/// Convert a sqlx error into the classified storage error.
pub fn storage_error(err: sqlx::Error) -> StorageError {
    if is_transient(&err) {
        StorageError::Transient(err.to_string())
    } else {
        StorageError::Fatal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn connection_sqlstates_are_transient() {
        assert!(is_transient_sqlstate("53300"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(is_transient_sqlstate("08006"));
    }

    #[test]
    fn statement_sqlstates_are_fatal() {
        // unique_violation, check_violation, syntax_error
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("23514"));
        assert!(!is_transient_sqlstate("42601"));
    }

    #[test]
    fn pool_timeout_is_transient() {
        assert_matches!(storage_error(sqlx::Error::PoolTimedOut), StorageError::Transient(_));
    }

    #[test]
    fn broken_socket_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert_matches!(storage_error(sqlx::Error::Io(io)), StorageError::Transient(_));
    }

    #[test]
    fn row_not_found_is_fatal() {
        assert_matches!(storage_error(sqlx::Error::RowNotFound), StorageError::Fatal(_));
    }

    #[test]
    fn closed_pool_is_fatal() {
        assert_matches!(storage_error(sqlx::Error::PoolClosed), StorageError::Fatal(_));
    }
}
