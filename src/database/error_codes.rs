//! PostgreSQL Error Codes
//!
//! SQLSTATE constants and the single place where `sqlx` errors are sorted
//! into transient store failures and fatal data/programming errors.
//!
//! ## SQLSTATE Format
//!
//! - 5-character codes representing error classes and conditions
//! - First 2 characters: error class
//! - Last 3 characters: specific condition
//!
//! Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>

use crate::error::StoreError;

/// PostgreSQL SQLSTATE error codes used for classification and log context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    // =========================================================================
    // Class 08 — Connection Exception
    // =========================================================================

    pub const CONNECTION_EXCEPTION_CLASS: &'static str = "08";

    // =========================================================================
    // Class 40 — Transaction Rollback
    // =========================================================================

    /// Serialization failure - Code 40001
    pub const SERIALIZATION_FAILURE: &'static str = "40001";

    /// Deadlock detected - Code 40P01
    pub const DEADLOCK_DETECTED: &'static str = "40P01";

    // =========================================================================
    // Class 53 — Insufficient Resources
    // =========================================================================

    pub const INSUFFICIENT_RESOURCES_CLASS: &'static str = "53";

    // =========================================================================
    // Class 57 — Operator Intervention
    // =========================================================================

    /// Query canceled by user request or statement timeout - Code 57014
    pub const QUERY_CANCELED: &'static str = "57014";

    /// Server is shutting down - Code 57P01
    pub const ADMIN_SHUTDOWN: &'static str = "57P01";

    /// Server crashed and is restarting - Code 57P02
    pub const CRASH_SHUTDOWN: &'static str = "57P02";

    /// Server is still starting up - Code 57P03
    pub const CANNOT_CONNECT_NOW: &'static str = "57P03";

    // =========================================================================
    // Class 42 — Syntax Error or Access Rule Violation
    // =========================================================================

    /// Table does not exist (yet) - Code 42P01
    pub const UNDEFINED_TABLE: &'static str = "42P01";

    // =========================================================================
    // Class 3D — Invalid Catalog Name
    // =========================================================================

    /// Database does not exist (yet) - Code 3D000
    pub const INVALID_CATALOG_NAME: &'static str = "3D000";

    pub const SYNTAX_OR_ACCESS_RULE_CLASS: &'static str = "42";

    /// Undefined column - Code 42703
    pub const UNDEFINED_COLUMN: &'static str = "42703";

    // =========================================================================
    // Class 22 — Data Exception
    // =========================================================================

    pub const DATA_EXCEPTION_CLASS: &'static str = "22";

    /// Invalid text representation - Code 22P02
    pub const INVALID_TEXT_REPRESENTATION: &'static str = "22P02";

    // =========================================================================
    // Class 23 — Integrity Constraint Violation
    // =========================================================================

    pub const INTEGRITY_CONSTRAINT_VIOLATION_CLASS: &'static str = "23";

    /// NOT NULL constraint violation - Code 23502
    pub const NOT_NULL_VIOLATION: &'static str = "23502";

    /// Check if the error code is a connection exception (Class 08)
    #[inline]
    pub fn is_connection_exception(code: &str) -> bool {
        code.starts_with(Self::CONNECTION_EXCEPTION_CLASS)
    }

    /// Check if the server is going away or not yet accepting connections
    #[inline]
    pub fn is_server_unavailable(code: &str) -> bool {
        matches!(
            code,
            Self::ADMIN_SHUTDOWN | Self::CRASH_SHUTDOWN | Self::CANNOT_CONNECT_NOW
        ) || code.starts_with(Self::INSUFFICIENT_RESOURCES_CLASS)
    }

    /// Check if the error is retryable (serialization failure or deadlock)
    #[inline]
    pub fn is_retryable_transaction_error(code: &str) -> bool {
        code == Self::SERIALIZATION_FAILURE || code == Self::DEADLOCK_DETECTED
    }

    /// Statement cancelled, usually by `statement_timeout`
    #[inline]
    pub fn is_query_canceled(code: &str) -> bool {
        code == Self::QUERY_CANCELED
    }

    /// Check if the error code is any integrity constraint violation (Class 23)
    #[inline]
    pub fn is_integrity_constraint_violation(code: &str) -> bool {
        code.starts_with(Self::INTEGRITY_CONSTRAINT_VIOLATION_CLASS)
    }

    /// Check if the error code is a data exception (Class 22)
    #[inline]
    pub fn is_data_exception(code: &str) -> bool {
        code.starts_with(Self::DATA_EXCEPTION_CLASS)
    }

    /// Check if the error code is a syntax or access rule violation (Class 42)
    #[inline]
    pub fn is_syntax_or_access_rule_violation(code: &str) -> bool {
        code.starts_with(Self::SYNTAX_OR_ACCESS_RULE_CLASS)
    }
}

/// Classify a `sqlx` error for the given store operation.
///
/// Lost connections, an unavailable server, transaction conflicts, statement
/// cancellation and a database or `tasks` table that does not exist yet are
/// transient:
/// the executor drops its connection, waits and reconnects. Every other
/// server-reported error (bad SQL, bad data, constraint violations, unknown
/// codes) and every error decoding a row is fatal.
pub fn classify(operation: &'static str, err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            let message = db_err.message();
            if PgErrorCode::is_connection_exception(&code)
                || PgErrorCode::is_server_unavailable(&code)
            {
                StoreError::unavailable(operation, format!("server unavailable [{code}]: {message}"))
            } else if PgErrorCode::is_retryable_transaction_error(&code) {
                StoreError::unavailable(operation, format!("transaction conflict [{code}]: {message}"))
            } else if PgErrorCode::is_query_canceled(&code) {
                StoreError::unavailable(operation, format!("statement canceled [{code}]: {message}"))
            } else if code == PgErrorCode::UNDEFINED_TABLE
                || code == PgErrorCode::INVALID_CATALOG_NAME
            {
                StoreError::unavailable(operation, format!("schema not ready [{code}]: {message}"))
            } else {
                let kind = if PgErrorCode::is_syntax_or_access_rule_violation(&code) {
                    "invalid statement"
                } else if PgErrorCode::is_data_exception(&code) {
                    "invalid data"
                } else if PgErrorCode::is_integrity_constraint_violation(&code) {
                    "constraint violation"
                } else {
                    "unexpected server error"
                };
                StoreError::invalid_data(operation, format!("{kind} [{code}]: {message}"))
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::unavailable(operation, err.to_string()),
        // Row/column/decode/type/configuration errors
        _ => StoreError::invalid_data(operation, err.to_string()),
    }
}
