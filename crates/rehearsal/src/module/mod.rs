//! The per-test lifecycle controller.
//!
//! A [`Module`] is created once per suite and driven by the test harness:
//! [`Module::initialize`] once, then [`Module::before`] and [`Module::after`]
//! around every test. Between the two calls the helpers in this module's
//! submodules (session, records, services, routes) operate on the live
//! application.

mod orm;
mod routes;
mod services;
mod session;

use rehearsal_config::ModuleConfig;
use rehearsal_connector::Connector;
use rehearsal_core::application::{
    ApplicationSupplier, BootstrapLoader, BootstrapRegistry, Injectable,
};
use rehearsal_core::cookies::Cookies;
use rehearsal_core::db::{DbConnection, DbError, SharedConnection};
use rehearsal_core::di::Container;
use rehearsal_core::orm::ModelRegistry;
use rehearsal_core::session::SharedSession;
use rehearsal_core::{ExecutionContext, HarnessError, HarnessResult};
use rehearsal_session::{AdapterFactory, AdapterRegistry, TestSessionManager};
use rehearsal_telemetry::{debug_section, logging::sections};
use serde_json::Map;
use std::fmt;
use std::sync::Arc;

/// Optional helper groups this module provides.
pub const PARTS: [&str; 2] = ["orm", "services"];

/// The test currently between `before` and `after`.
struct ActiveTest {
    name: String,
    application: Arc<dyn Injectable>,
    di: Arc<Container>,
}

/// Per-test lifecycle controller.
///
/// # Example
///
/// ```rust
/// use rehearsal::Module;
/// use rehearsal_config::ModuleConfig;
/// use rehearsal_core::db::DbConnection;
/// use rehearsal_core::fixtures::{self, MemoryConnection};
/// use rehearsal_core::ExecutionContext;
/// use std::sync::Arc;
///
/// let db = Arc::new(MemoryConnection::new());
/// let mut module = Module::new(ModuleConfig::default())
///     .with_bootstrap_loader(Arc::new(fixtures::bootstrap_registry(Arc::clone(&db))));
/// module.initialize().unwrap();
///
/// let mut ctx = ExecutionContext::new();
/// module.before("first", &mut ctx).unwrap();
/// assert_eq!(db.transaction_level(), 1);
///
/// module.after("first", &mut ctx).unwrap();
/// assert_eq!(db.transaction_level(), 0);
/// ```
pub struct Module {
    config: ModuleConfig,
    loader: Arc<dyn BootstrapLoader>,
    adapters: AdapterRegistry,
    models: ModelRegistry,
    adapter_factory: Option<AdapterFactory>,
    connector: Connector,
    active: Option<ActiveTest>,
}

impl Module {
    /// Creates a module with an empty bootstrap loader and the built-in
    /// session adapters.
    #[must_use]
    pub fn new(config: ModuleConfig) -> Self {
        let loader: Arc<dyn BootstrapLoader> = Arc::new(BootstrapRegistry::new());
        Self {
            config,
            connector: Connector::with_loader(Arc::clone(&loader)),
            loader,
            adapters: AdapterRegistry::default(),
            models: ModelRegistry::new(),
            adapter_factory: None,
            active: None,
        }
    }

    /// Sets where bootstrap keys are resolved.
    #[must_use]
    pub fn with_bootstrap_loader(mut self, loader: Arc<dyn BootstrapLoader>) -> Self {
        self.connector = Connector::with_loader(Arc::clone(&loader));
        self.loader = loader;
        self.adapter_factory = None;
        self
    }

    /// Sets the session adapters the `session` option picks from.
    #[must_use]
    pub fn with_session_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self.adapter_factory = None;
        self
    }

    /// Sets the models the record helpers can use.
    #[must_use]
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Checks the configuration once per suite.
    ///
    /// Fails with a configuration error when the bootstrap is unknown to the
    /// loader or the session adapter is not registered.
    pub fn initialize(&mut self) -> HarnessResult<()> {
        self.config
            .validate()
            .map_err(|e| HarnessError::configuration(e.to_string()))?;

        let bootstrap = &self.config.bootstrap;
        if !self.loader.exists(bootstrap) {
            return Err(HarnessError::configuration(format!(
                "Bootstrap does not exist in {path}\n\
                 Please register a bootstrap that returns the application\n\
                 and specify its key with the 'bootstrap' option\n\n\
                 Sample bootstrap:\n\n\
                 BootstrapRegistry::new().with(\"{path}\", || {{\n    \
                     Ok(Arc::new(MyApplication::new()) as Arc<dyn Injectable>)\n\
                 }})",
                path = bootstrap.display()
            )));
        }

        self.config
            .check_session_adapter(self.adapters.names())
            .map_err(|e| HarnessError::configuration(e.to_string()))?;
        let factory = self
            .adapters
            .resolve(&self.config.session)
            .map_err(|e| HarnessError::configuration(e.to_string()))?;
        self.adapter_factory = Some(factory);

        tracing::debug!(
            bootstrap = %bootstrap.display(),
            session = %self.config.session,
            "module initialized"
        );
        Ok(())
    }

    /// Prepares the application for a test.
    ///
    /// Loads the bootstrap, makes its container the default one, installs a
    /// fresh session, turns off cookie encryption, opens a transaction when
    /// cleanup is on and hands the application to the connector. When any of
    /// these steps fails the context is cleared again.
    pub fn before(&mut self, test_name: &str, ctx: &mut ExecutionContext) -> HarnessResult<()> {
        if let Some(running) = &self.active {
            return Err(HarnessError::lifecycle(format!(
                "before() called for '{test_name}' while '{}' is still running",
                running.name
            )));
        }
        if self.adapter_factory.is_none() {
            self.initialize()?;
        }

        let application = self.loader.load(&self.config.bootstrap)?;
        let di = application.di().ok_or_else(|| {
            HarnessError::configuration(format!(
                "Bootstrap must return an object with a dependency injection container, got {}",
                application.type_name()
            ))
        })?;

        ctx.reset_default();
        ctx.set_default(Arc::clone(&di));
        if let Err(e) = self.prepare(&di) {
            ctx.reset_default();
            ctx.clear_ambient();
            return Err(e);
        }

        self.connector
            .set_application(ApplicationSupplier::Instance(Arc::clone(&application)));
        self.active = Some(ActiveTest {
            name: test_name.to_string(),
            application,
            di,
        });

        tracing::debug!(test = test_name, "test started");
        Ok(())
    }

    /// Tears a test down.
    ///
    /// Rolls back every open transaction level and closes the connection,
    /// then resets the default container and clears the ambient state. The
    /// clearing steps run even when the database calls fail; the first
    /// database error other than a driver error is returned afterwards.
    /// Without a matching `before` the context is still cleared before the
    /// lifecycle error is returned.
    pub fn after(&mut self, test_name: &str, ctx: &mut ExecutionContext) -> HarnessResult<()> {
        let Some(finished) = self.active.take() else {
            ctx.reset_default();
            ctx.clear_ambient();
            return Err(HarnessError::lifecycle(format!(
                "after() called for '{test_name}' without a matching before()"
            )));
        };

        let mut failure = None;
        if self.config.cleanup && finished.di.has("db") {
            match connection(&finished.di) {
                Ok(db) => {
                    if let Err(e) = rollback_all(db.as_ref()) {
                        failure = Some(HarnessError::from(e));
                    }
                    if let Err(e) = db.close() {
                        failure.get_or_insert(HarnessError::from(e));
                    }
                }
                Err(e) => failure = Some(e),
            }
        }

        drop(finished);
        ctx.reset_default();
        ctx.clear_ambient();
        self.connector.clear_application();
        self.connector.restart();

        tracing::debug!(test = test_name, failed = failure.is_some(), "test finished");
        failure.map_or(Ok(()), Err)
    }

    fn prepare(&self, di: &Arc<Container>) -> HarnessResult<()> {
        if di.has("session") {
            if let Some(factory) = &self.adapter_factory {
                let manager = TestSessionManager::with_adapter(factory(&Map::new()));
                di.set_instance("session", Arc::new(Arc::new(manager) as SharedSession));
            }
        }

        if di.has("cookies") {
            di.get::<Cookies>("cookies")?.use_encryption(false);
        }

        if self.config.cleanup && di.has("db") {
            let db = connection(di)?;
            if self.config.savepoints {
                db.set_nested_transactions_with_savepoints(true)?;
            }
            db.begin()?;
            debug_section!(sections::DATABASE, "Transaction started");
        }
        Ok(())
    }

    /// Returns `true` between `before` and `after`.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the optional helper groups.
    pub fn parts(&self) -> &'static [&'static str] {
        &PARTS
    }

    /// Resolves the application attached to the connector.
    pub fn application(&self) -> HarnessResult<Arc<dyn Injectable>> {
        self.connector.application()
    }

    /// Returns the running test's container.
    pub fn container(&self) -> Option<&Arc<Container>> {
        self.active.as_ref().map(|test| &test.di)
    }

    /// Returns the connector.
    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    /// Returns the connector for configuration such as server parameters.
    pub fn connector_mut(&mut self) -> &mut Connector {
        &mut self.connector
    }

    pub(crate) fn di(&self) -> HarnessResult<&Arc<Container>> {
        self.container()
            .ok_or_else(|| HarnessError::lifecycle("No test is running; call before() first"))
    }

    pub(crate) fn models(&self) -> &ModelRegistry {
        &self.models
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("config", &self.config)
            .field("models", &self.models)
            .field(
                "active",
                &self.active.as_ref().map(|test| (&test.name, test.application.type_name())),
            )
            .finish_non_exhaustive()
    }
}

fn connection(di: &Container) -> HarnessResult<SharedConnection> {
    di.get::<SharedConnection>("db").map(|db| Arc::clone(db.as_ref()))
}

/// Rolls back until no transaction is open.
///
/// Stops early when a rollback leaves the nesting level unchanged, so a
/// connection that keeps failing is attempted once per level at most.
/// Driver errors are tolerated; any other error ends the loop.
fn rollback_all(db: &dyn DbConnection) -> Result<(), DbError> {
    while db.is_under_transaction() {
        let level = db.transaction_level();
        match db.rollback(true) {
            Ok(()) => {
                debug_section!(sections::DATABASE, "Transaction cancelled; all changes reverted.");
            }
            Err(e) if e.is_driver() => {
                tracing::warn!(error = %e, level, "rollback failed");
            }
            Err(e) => return Err(e),
        }
        if level == db.transaction_level() {
            break;
        }
    }
    Ok(())
}
