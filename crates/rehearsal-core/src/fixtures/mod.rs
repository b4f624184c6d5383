//! Test fixtures for Rehearsal development and testing.
//!
//! This module provides a small application stack that behaves like the
//! framework applications the harness drives: a transactional in-memory
//! database, an `Articles` model, and reference MVC and micro applications
//! sharing one service layout.
//!
//! # Example
//!
//! ```
//! use rehearsal_core::application::BootstrapLoader;
//! use rehearsal_core::fixtures::{self, MemoryConnection};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let loader = fixtures::bootstrap_registry(Arc::new(MemoryConnection::new()));
//! assert!(loader.exists(Path::new(fixtures::MVC_BOOTSTRAP)));
//!
//! let app = loader.load(Path::new(fixtures::MVC_BOOTSTRAP)).unwrap();
//! assert!(app.as_application().is_some());
//! ```

mod apps;
mod database;
mod models;

pub use apps::{default_container, Detached, MicroApplication, MvcApplication, ServicesOnly};
pub use database::MemoryConnection;
pub use models::{Article, ArticlesClass};

use crate::application::{BootstrapRegistry, Injectable};
use crate::orm::ModelRegistry;
use std::sync::Arc;

/// Service name of the fixture store.
pub const MEMORY_DB_SERVICE: &str = "memoryDb";

/// Bootstrap key of the MVC application (the default bootstrap path).
pub const MVC_BOOTSTRAP: &str = "app/config/bootstrap.php";

/// Bootstrap key of the micro application.
pub const MICRO_BOOTSTRAP: &str = "app/config/micro.php";

/// Bootstrap key of an object that has services but cannot handle requests.
pub const SERVICES_ONLY_BOOTSTRAP: &str = "app/config/services-only.php";

/// Bootstrap key of an object without a container.
pub const DETACHED_BOOTSTRAP: &str = "app/config/detached.php";

/// Builds a bootstrap registry for every fixture application.
///
/// Each load builds a fresh application over the same `connection`, so data
/// committed in one test stays visible to the next one.
#[must_use]
pub fn bootstrap_registry(connection: Arc<MemoryConnection>) -> BootstrapRegistry {
    let mvc = Arc::clone(&connection);
    let micro = connection;
    BootstrapRegistry::new()
        .with(MVC_BOOTSTRAP, move || {
            Ok(Arc::new(MvcApplication::new(Arc::clone(&mvc))) as Arc<dyn Injectable>)
        })
        .with(MICRO_BOOTSTRAP, move || {
            Ok(Arc::new(MicroApplication::new(Arc::clone(&micro))) as Arc<dyn Injectable>)
        })
        .with(SERVICES_ONLY_BOOTSTRAP, || {
            Ok(Arc::new(ServicesOnly::default()) as Arc<dyn Injectable>)
        })
        .with(DETACHED_BOOTSTRAP, || Ok(Arc::new(Detached) as Arc<dyn Injectable>))
}

/// Returns a model registry containing the fixture models.
#[must_use]
pub fn model_registry() -> ModelRegistry {
    ModelRegistry::new().with(Arc::new(ArticlesClass))
}
