//! Error types for Rehearsal.
//!
//! This module provides the [`HarnessError`] type, the standard error type
//! used by the connector and the lifecycle controller.
//!
//! # Taxonomy
//!
//! | Variant | Raised by | Retried |
//! |---|---|---|
//! | `Configuration` | `Module::initialize`, bootstrap resolution | never |
//! | `UnsupportedApplication` | `Connector::do_request`, `Module::before` | never |
//! | `Database` | transaction handling in `before`/`after` | never |
//! | `ServiceNotFound` / `ServiceType` | container lookups | never |
//! | `ModelNotFound` / `InvalidModel` | ORM helpers | never |
//! | `Lifecycle` | out-of-order `before`/`after` calls | never |
//!
//! Failed expectations (a record that should exist, a session value that does
//! not match) are not errors: the assertion helpers panic with an
//! [`AssertionFailure`] message so the test harness reports a failed test.

use crate::db::DbError;
use crate::session::SessionError;
use std::fmt;
use thiserror::Error;

/// Result type alias using [`HarnessError`].
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Standard error type for Rehearsal.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Missing or invalid bootstrap, or a bootstrap that returned the wrong type.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// The resolved application is neither an MVC application nor a micro application.
    #[error("Unsupported application class: {type_name}")]
    UnsupportedApplication {
        /// Type name of the value that was resolved.
        type_name: String,
    },

    /// A database call failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// A session call failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// The container has no service registered under the name.
    #[error("Service {name} is not available in container")]
    ServiceNotFound {
        /// Service name.
        name: String,
    },

    /// The service exists but resolved to a different type.
    #[error("Service {name} is not of type {expected}")]
    ServiceType {
        /// Service name.
        name: String,
        /// The type that was requested.
        expected: &'static str,
    },

    /// No model class is registered under the name.
    #[error("Model {model} does not exist")]
    ModelNotFound {
        /// Model name.
        model: String,
    },

    /// The name resolved to something that is not a model.
    #[error("Model {model} is not a model class: {reason}")]
    InvalidModel {
        /// Model name.
        model: String,
        /// Why the model could not be used.
        reason: String,
    },

    /// `before`/`after` were called out of order.
    #[error("Lifecycle error: {message}")]
    Lifecycle {
        /// Human-readable error message.
        message: String,
    },

    /// A response header could not be represented.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Why the header was rejected.
        reason: String,
    },

    /// The application entry point failed.
    #[error("Handler error: {message}")]
    Handler {
        /// Human-readable error message.
        message: String,
    },
}

impl HarnessError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an unsupported application error.
    #[must_use]
    pub fn unsupported_application(type_name: impl Into<String>) -> Self {
        Self::UnsupportedApplication {
            type_name: type_name.into(),
        }
    }

    /// Creates a service-not-found error.
    #[must_use]
    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::ServiceNotFound { name: name.into() }
    }

    /// Creates a service type mismatch error for `T`.
    #[must_use]
    pub fn service_type<T: ?Sized>(name: impl Into<String>) -> Self {
        Self::ServiceType {
            name: name.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Creates a model-not-found error.
    #[must_use]
    pub fn model_not_found(model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model: model.into(),
        }
    }

    /// Creates an invalid model error.
    #[must_use]
    pub fn invalid_model(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Creates a lifecycle error.
    #[must_use]
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    /// Creates an invalid header error.
    #[must_use]
    pub fn invalid_header(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a handler error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that abort test setup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::UnsupportedApplication { .. } | Self::Lifecycle { .. }
        )
    }
}

/// A failed expectation raised by an assertion helper.
///
/// Assertion helpers panic with this message; it exists so the message
/// format is the same everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    /// What was expected and what was found.
    pub message: String,
}

impl AssertionFailure {
    /// Creates a new assertion failure.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Panics with this failure as the message.
    #[track_caller]
    pub fn raise(self) -> ! {
        panic!("{self}")
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assertion failed: {}", self.message)
    }
}

impl std::error::Error for AssertionFailure {}
