//! Typed configuration for the Rehearsal lifecycle controller.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use rehearsal_config::ConfigLoader;
//!
//! # fn main() -> Result<(), rehearsal_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("rehearsal.toml")?
//!     .with_env_prefix("REHEARSAL")
//!     .load()?;
//!
//! println!("Bootstrapping {}", config.bootstrap.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! bootstrap = "app/config/bootstrap.php"
//! cleanup = true
//! savepoints = true
//! session = "memory"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `REHEARSAL__BOOTSTRAP=app/config/micro.php`
//! - `REHEARSAL__CLEANUP=false`
//! - `REHEARSAL__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use rehearsal_telemetry::LogFormat;
