//! # Rehearsal
//!
//! **Functional testing for framework applications, without a web server.**
//!
//! Rehearsal drives an application in-process the way a browser would:
//!
//! - 🧪 **Per-test lifecycle** – [`Module::before`] loads the application and
//!   opens a transaction, [`Module::after`] rolls everything back
//! - 🔁 **Simulated requests** – the [`Connector`] rewrites the ambient request
//!   state and converts the application's answer into a [`TestResponse`]
//! - 🗝️ **Isolated sessions** – every test gets a fresh in-memory session
//! - 🗄️ **Record helpers** – create and look up models in the test transaction
//!
//! ## Quick Start
//!
//! ```rust
//! use rehearsal::prelude::*;
//! use rehearsal_core::fixtures::{self, MemoryConnection};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), HarnessError> {
//! let db = Arc::new(MemoryConnection::new());
//! let mut module = Module::new(ModuleConfig::default())
//!     .with_bootstrap_loader(Arc::new(fixtures::bootstrap_registry(db)))
//!     .with_models(fixtures::model_registry());
//! module.initialize()?;
//!
//! let mut ctx = ExecutionContext::new();
//! module.before("greets the visitor", &mut ctx)?;
//!
//! let response = module.am_on_page("/?name=Ada", &mut ctx)?;
//! response.assert_status_code(200);
//!
//! module.after("greets the visitor", &mut ctx)?;
//! assert!(ctx.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! before → bootstrap → session override → plaintext cookies → BEGIN → attach to connector
//!                                                                          ↓
//!                                                              test body: do_request …
//!                                                                          ↓
//! after  → ROLLBACK (every level) → close → reset container → clear ambient state
//! ```

#![doc(html_root_url = "https://docs.rs/rehearsal/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod module;

pub use module::{Module, PARTS};

// Re-export core types
pub use rehearsal_core as core;

// Re-export session types
pub use rehearsal_session as session;

// Re-export connector types
pub use rehearsal_connector as connector;

// Re-export configuration types
pub use rehearsal_config as config;

// Re-export telemetry types
pub use rehearsal_telemetry as telemetry;

pub use rehearsal_connector::{Connector, TestFile, TestRequest, TestResponse};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use rehearsal::prelude::*;
///
/// let config = ModuleConfig::default();
/// assert!(config.cleanup);
/// ```
pub mod prelude {
    pub use crate::Module;

    pub use rehearsal_core::{
        AmbientState, AssertionFailure, ExecutionContext, HarnessError, HarnessResult,
    };

    // Re-export application and DI types
    pub use rehearsal_core::application::{
        Application, ApplicationSupplier, BootstrapLoader, BootstrapRegistry, Handled, Injectable,
    };
    pub use rehearsal_core::di::{Container, ServiceDefinition};

    // Re-export request/response types
    pub use rehearsal_connector::{
        Connector, ConnectorError, TestFile, TestRequest, TestRequestBuilder, TestResponse,
    };

    // Re-export session types
    pub use rehearsal_session::{AdapterRegistry, MemorySession, TestSessionManager};

    // Re-export configuration types
    pub use rehearsal_config::{ConfigLoader, ModuleConfig};
    pub use rehearsal_telemetry::{init_logging, LogConfig, LogFormat};
}
