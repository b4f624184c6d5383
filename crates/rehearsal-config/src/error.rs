//! Errors raised while loading and checking module options.

use std::path::PathBuf;
use thiserror::Error;

/// Why a module configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read configuration file: {path}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The source is neither TOML nor JSON.
    #[error("unsupported configuration format '{format}', expected toml or json")]
    UnsupportedFormat {
        /// Format name or file extension that was given.
        format: String,
    },

    /// The TOML source is malformed or has unknown options.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The JSON source is malformed or has unknown options.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A `.env` file exists but could not be loaded.
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// No bootstrap was named.
    #[error("option 'bootstrap' must name the bootstrap that builds the application")]
    EmptyBootstrap,

    /// A required option is blank.
    #[error("option '{option}' must not be empty")]
    EmptyOption {
        /// Dotted option name.
        option: &'static str,
    },

    /// The `session` option names an adapter nobody registered.
    #[error("session adapter '{name}' is not registered (available: {})", available.join(", "))]
    UnknownSessionAdapter {
        /// The configured adapter name.
        name: String,
        /// Registered adapter names.
        available: Vec<String>,
    },

    /// An environment override could not be parsed.
    #[error("{var}={value} is invalid, expected {expected}")]
    InvalidEnv {
        /// Variable name.
        var: String,
        /// The rejected value.
        value: String,
        /// What the option accepts.
        expected: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub(crate) fn invalid_env(
        var: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidEnv {
            var: var.into(),
            value: value.into(),
            expected,
        }
    }

    /// Returns `true` when the error is about option values rather than
    /// the configuration source.
    #[must_use]
    pub fn is_invalid_option(&self) -> bool {
        matches!(
            self,
            Self::EmptyBootstrap
                | Self::EmptyOption { .. }
                | Self::UnknownSessionAdapter { .. }
                | Self::InvalidEnv { .. }
        )
    }
}
