//! Error types for pgbind.
//!
//! This module defines all error types using `thiserror`. The dispatcher only
//! ever translates one driver condition (zero rows on a single-row scan into
//! [`DalError::NotFound`]); every other driver error is carried unchanged in
//! [`DalError::Database`].

use crate::models::Operation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DalError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Not implemented: {operation} is not supported by {target}")]
    NotImplemented {
        operation: Operation,
        target: String,
    },

    #[error("Bad parameter: {message}")]
    BadParameter { message: String },

    #[error("Nothing to patch: {target} has no changes")]
    EmptyPatch { target: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Listener has no connection: call listen first")]
    NotListening,

    #[error("Transaction already finished")]
    TransactionClosed,

    /// A failed transaction whose rollback failed as well. Both errors stay visible.
    #[error("{source}; rollback failed: {rollback}")]
    Rollback {
        source: Box<DalError>,
        rollback: Box<DalError>,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl DalError {
    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a not implemented error for an operation a capability declines.
    pub fn not_implemented(operation: Operation, target: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation,
            target: target.into(),
        }
    }

    /// Create a bad parameter error.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter {
            message: message.into(),
        }
    }

    /// Create an empty patch error.
    pub fn empty_patch(target: impl Into<String>) -> Self {
        Self::EmptyPatch {
            target: target.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Join a transaction failure with the error raised while rolling it back.
    pub fn rollback(source: DalError, rollback: DalError) -> Self {
        Self::Rollback {
            source: Box::new(source),
            rollback: Box::new(rollback),
        }
    }

    /// Translate a driver error raised by a single-row scan.
    ///
    /// `RowNotFound` becomes [`DalError::NotFound`]; anything else passes through.
    pub(crate) fn from_row_scan(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("query returned no rows"),
            other => Self::Database(other),
        }
    }

    /// True for [`DalError::NotFound`], including one wrapped in a failed rollback.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Rollback { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// SQLSTATE of a pass-through database error, e.g. "23505" for a unique violation.
    pub fn sql_state(&self) -> Option<String> {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        }
    }
}

/// Result type alias for data-access operations.
pub type DalResult<T> = Result<T, DalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DalError::not_implemented(Operation::Patch, "audit_log");
        assert_eq!(
            err.to_string(),
            "Not implemented: PATCH is not supported by audit_log"
        );
    }

    #[test]
    fn test_row_not_found_translated() {
        let err = DalError::from_row_scan(sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_driver_errors_pass_through() {
        let err = DalError::from_row_scan(sqlx::Error::PoolClosed);
        assert!(matches!(err, DalError::Database(sqlx::Error::PoolClosed)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_rollback_keeps_both_errors() {
        let err = DalError::rollback(
            DalError::not_found("widget 7"),
            DalError::Database(sqlx::Error::PoolClosed),
        );
        let message = err.to_string();
        assert!(message.contains("widget 7"));
        assert!(message.contains("rollback failed"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_retryable() {
        assert!(DalError::timeout("query", 30).is_retryable());
        assert!(DalError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!DalError::bad_parameter("pid must be non-zero").is_retryable());
        assert!(!DalError::NotListening.is_retryable());
    }

    #[test]
    fn test_sql_state_absent_for_domain_errors() {
        assert_eq!(DalError::not_found("x").sql_state(), None);
    }
}
