//! Structured logging for Rehearsal.
//!
//! - [`logging::init_logging`] installs a `tracing-subscriber` registry with
//!   an `EnvFilter` and JSON or pretty output
//! - [`debug_section!`] emits a debug event tagged with a named section, the
//!   output a test runner prints between steps
//!
//! # Example
//!
//! ```
//! use rehearsal_telemetry::{debug_section, logging::sections};
//!
//! debug_section!(sections::DATABASE, "Transaction started");
//! debug_section!(sections::QUERY, conditions = "[title] = :title:", "Finding record");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};

#[doc(hidden)]
pub use tracing as __tracing;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Emits a debug event in a named output section.
#[macro_export]
macro_rules! debug_section {
    ($section:expr, $($arg:tt)+) => {
        $crate::__tracing::debug!(section = %$section, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_section_expands() {
        debug_section!(logging::sections::SESSION, "{}", "{\"a\":1}");
        debug_section!("Custom", count = 3, "with fields");
    }

    #[test]
    fn test_result_alias() {
        let result: TelemetryResult<()> = Err(TelemetryError::InvalidConfig("bad".into()));
        assert!(result.is_err());
    }
}
