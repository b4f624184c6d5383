//! Main configuration types.
//!
//! This module provides the top-level [`ModuleConfig`] struct and its builder.

use std::path::PathBuf;

use rehearsal_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default bootstrap key.
pub const DEFAULT_BOOTSTRAP: &str = "app/config/bootstrap.php";

/// Default session adapter name.
pub const DEFAULT_SESSION: &str = "memory";

/// Lifecycle controller configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use rehearsal_config::ModuleConfig;
///
/// let config = ModuleConfig::default();
/// assert_eq!(config.bootstrap.to_str(), Some("app/config/bootstrap.php"));
/// assert!(config.cleanup);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Key of the application bootstrap.
    #[serde(default = "default_bootstrap")]
    pub bootstrap: PathBuf,

    /// Wrap every test in a transaction that is rolled back afterwards.
    #[serde(default = "default_true")]
    pub cleanup: bool,

    /// Use savepoints for nested transactions.
    #[serde(default = "default_true")]
    pub savepoints: bool,

    /// Name of the session adapter installed before every test.
    #[serde(default = "default_session")]
    pub session: String,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            bootstrap: default_bootstrap(),
            cleanup: true,
            savepoints: true,
            session: default_session(),
            logging: LoggingSection::default(),
        }
    }
}

impl ModuleConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use rehearsal_config::ModuleConfig;
    ///
    /// let config = ModuleConfig::builder()
    ///     .bootstrap("app/config/micro.php")
    ///     .cleanup(false)
    ///     .build();
    ///
    /// assert!(!config.cleanup);
    /// ```
    #[must_use]
    pub fn builder() -> ModuleConfigBuilder {
        ModuleConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bootstrap.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBootstrap);
        }
        if self.session.trim().is_empty() {
            return Err(ConfigError::EmptyOption { option: "session" });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::EmptyOption {
                option: "logging.level",
            });
        }
        Ok(())
    }

    /// Checks that the `session` option names one of `available`.
    pub fn check_session_adapter<'a, I>(&self, available: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: Vec<String> = available.into_iter().map(str::to_string).collect();
        if available.iter().any(|name| *name == self.session) {
            return Ok(());
        }
        Err(ConfigError::UnknownSessionAdapter {
            name: self.session.clone(),
            available,
        })
    }

    /// Create a development preset: pretty debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            ..Self::default()
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directive (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingSection {
    /// Converts the section into a logging setup.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level.clone(),
            format: self.format,
            ..LogConfig::default()
        }
    }
}

/// Builder for [`ModuleConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct ModuleConfigBuilder {
    config: ModuleConfig,
}

impl ModuleConfigBuilder {
    /// Set the bootstrap key.
    pub fn bootstrap(mut self, bootstrap: impl Into<PathBuf>) -> Self {
        self.config.bootstrap = bootstrap.into();
        self
    }

    /// Enable or disable transactional cleanup.
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.config.cleanup = cleanup;
        self
    }

    /// Enable or disable savepoints.
    pub fn savepoints(mut self, savepoints: bool) -> Self {
        self.config.savepoints = savepoints;
        self
    }

    /// Set the session adapter name.
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.config.session = session.into();
        self
    }

    /// Set the logging section.
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ModuleConfig {
        self.config
    }

    /// Build and validate the configuration.
    pub fn build_validated(self) -> Result<ModuleConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn default_bootstrap() -> PathBuf {
    PathBuf::from(DEFAULT_BOOTSTRAP)
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModuleConfig::default();
        assert_eq!(config.bootstrap, PathBuf::from(DEFAULT_BOOTSTRAP));
        assert!(config.cleanup);
        assert!(config.savepoints);
        assert_eq!(config.session, DEFAULT_SESSION);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ModuleConfig::builder()
            .bootstrap("app/config/micro.php")
            .savepoints(false)
            .session("custom")
            .build();
        assert_eq!(config.bootstrap, PathBuf::from("app/config/micro.php"));
        assert!(!config.savepoints);
        assert_eq!(config.session, "custom");
        assert!(config.cleanup);
    }

    #[test]
    fn test_validate_empty_bootstrap() {
        let result = ModuleConfig::builder().bootstrap("").build_validated();
        assert!(matches!(result, Err(ConfigError::EmptyBootstrap)));
    }

    #[test]
    fn test_validate_empty_session() {
        let result = ModuleConfig::builder().session("  ").build_validated();
        assert!(matches!(
            result,
            Err(ConfigError::EmptyOption { option: "session" })
        ));
    }

    #[test]
    fn test_check_session_adapter() {
        let config = ModuleConfig::builder().session("redis").build();
        assert!(ModuleConfig::default()
            .check_session_adapter(["memory"])
            .is_ok());

        let err = config.check_session_adapter(["memory", "files"]).unwrap_err();
        match err {
            ConfigError::UnknownSessionAdapter { name, available } => {
                assert_eq!(name, "redis");
                assert_eq!(available, ["memory", "files"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_development_preset() {
        let config = ModuleConfig::development();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        let log = config.logging.to_log_config();
        assert_eq!(log.format, LogFormat::Pretty);
        assert!(log.enabled);
    }

    #[test]
    fn test_toml_round_trip_keeps_sections() {
        let toml_str = toml::to_string_pretty(&ModuleConfig::default()).unwrap();
        assert!(toml_str.contains("bootstrap = \"app/config/bootstrap.php\""));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml_str = r#"
            bootstrap = "app/config/bootstrap.php"
            unknown_field = "value"
        "#;
        let result: Result<ModuleConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }
}
