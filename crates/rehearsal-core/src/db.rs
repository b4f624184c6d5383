//! Database connection capability.
//!
//! The lifecycle controller only needs transaction control from the
//! application's `db` service: begin, roll back one level, report the nesting
//! level, and close. Connections are registered in the container as
//! [`SharedConnection`] so the service can be resolved without knowing the
//! concrete driver type.

use std::sync::Arc;
use thiserror::Error;

/// A database connection as stored in the container's `db` service.
pub type SharedConnection = Arc<dyn DbConnection>;

/// Errors raised by a database connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// A driver-level failure while talking to the server.
    ///
    /// This is the only kind tolerated by the teardown rollback loop.
    #[error("Driver error: {message}")]
    Driver {
        /// Driver message.
        message: String,
    },

    /// A rollback was requested with no active transaction.
    #[error("There is no active transaction")]
    NoActiveTransaction,

    /// The connection has been closed.
    #[error("Connection is closed")]
    Closed,

    /// A query or statement failed.
    #[error("Query error: {message}")]
    Query {
        /// Error message.
        message: String,
    },
}

impl DbError {
    /// Creates a driver error.
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Creates a query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Returns `true` for driver errors.
    #[must_use]
    pub const fn is_driver(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }
}

/// Transaction control over a database connection.
///
/// Implementations use interior mutability; the connection is shared between
/// the application and the lifecycle controller.
pub trait DbConnection: Send + Sync {
    /// Starts a transaction, or a nested level inside the current one.
    fn begin(&self) -> Result<(), DbError>;

    /// Rolls back one nesting level.
    ///
    /// With `to_savepoint` and savepoints enabled, a nested level rolls back
    /// to its savepoint; otherwise the whole transaction is discarded.
    fn rollback(&self, to_savepoint: bool) -> Result<(), DbError>;

    /// Returns `true` while a transaction is open.
    fn is_under_transaction(&self) -> bool;

    /// Returns the current nesting level (0 when no transaction is open).
    fn transaction_level(&self) -> usize;

    /// Enables or disables savepoints for nested transactions.
    fn set_nested_transactions_with_savepoints(&self, enabled: bool) -> Result<(), DbError>;

    /// Closes the connection.
    fn close(&self) -> Result<(), DbError>;
}
