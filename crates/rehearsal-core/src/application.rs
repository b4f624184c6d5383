//! Application capabilities and suppliers.
//!
//! An application under test is anything [`Injectable`]: it exposes the
//! container its services live in. Applications that can handle requests
//! also implement [`Application`], and report so through
//! [`Injectable::as_application`]. The connector only drives recognized
//! applications.
//!
//! Applications are supplied as a ready instance, a factory, or a bootstrap
//! key resolved through a [`BootstrapLoader`].

use crate::context::ExecutionContext;
use crate::di::Container;
use crate::http::Response;
use crate::{HarnessError, HarnessResult};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A value that exposes a dependency injection container.
pub trait Injectable: Send + Sync {
    /// Returns the container, if the value has one.
    fn di(&self) -> Option<Arc<Container>>;

    /// Returns the value as a request-handling application.
    fn as_application(&self) -> Option<&dyn Application> {
        None
    }

    /// Returns the concrete type name, used in error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The kinds of application the connector can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationKind {
    /// A full-stack MVC application (router, dispatcher, views).
    Mvc,
    /// A micro application (route closures).
    Micro,
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mvc => f.write_str("mvc"),
            Self::Micro => f.write_str("micro"),
        }
    }
}

/// What an application's entry point returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// A response object.
    Response(Response),
    /// A plain value (micro handlers may return anything).
    Value(serde_json::Value),
    /// Nothing; output went to the `response` service.
    Nothing,
}

/// A request-handling application.
pub trait Application: Injectable {
    /// Returns the application kind.
    fn kind(&self) -> ApplicationKind;

    /// Handles the request for `path`.
    ///
    /// The query string, parameters and the rest of the request are read from
    /// the context's ambient state and the container's `request` service.
    fn handle(&self, path: &str, ctx: &ExecutionContext) -> HarnessResult<Handled>;
}

/// A factory producing the application.
pub type ApplicationFactory = Arc<dyn Fn() -> HarnessResult<Arc<dyn Injectable>> + Send + Sync>;

/// How the application under test is obtained.
#[derive(Clone)]
pub enum ApplicationSupplier {
    /// A ready instance.
    Instance(Arc<dyn Injectable>),
    /// A factory called on every resolution.
    Factory(ApplicationFactory),
    /// A bootstrap key resolved through a [`BootstrapLoader`] on every
    /// resolution.
    Bootstrap(PathBuf),
}

impl ApplicationSupplier {
    /// Wraps a ready instance.
    pub fn instance<A: Injectable + 'static>(application: A) -> Self {
        Self::Instance(Arc::new(application))
    }

    /// Wraps a factory.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> HarnessResult<Arc<dyn Injectable>> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Resolves the application.
    pub fn resolve(&self, loader: &dyn BootstrapLoader) -> HarnessResult<Arc<dyn Injectable>> {
        match self {
            Self::Instance(application) => Ok(Arc::clone(application)),
            Self::Factory(factory) => factory(),
            Self::Bootstrap(path) => loader.load(path),
        }
    }
}

impl fmt::Debug for ApplicationSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(application) => f
                .debug_tuple("ApplicationSupplier::Instance")
                .field(&application.type_name())
                .finish(),
            Self::Factory(_) => f.write_str("ApplicationSupplier::Factory"),
            Self::Bootstrap(path) => f
                .debug_tuple("ApplicationSupplier::Bootstrap")
                .field(path)
                .finish(),
        }
    }
}

/// Resolves bootstrap keys to applications.
pub trait BootstrapLoader: Send + Sync {
    /// Returns `true` if the bootstrap can be loaded.
    fn exists(&self, path: &Path) -> bool;

    /// Loads the application the bootstrap returns.
    fn load(&self, path: &Path) -> HarnessResult<Arc<dyn Injectable>>;
}

/// A bootstrap loader backed by registered factories.
#[derive(Clone, Default)]
pub struct BootstrapRegistry {
    entries: IndexMap<PathBuf, ApplicationFactory>,
}

impl BootstrapRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for a bootstrap key.
    #[must_use]
    pub fn with<F>(mut self, path: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn() -> HarnessResult<Arc<dyn Injectable>> + Send + Sync + 'static,
    {
        self.register(path, factory);
        self
    }

    /// Registers the factory for a bootstrap key.
    pub fn register<F>(&mut self, path: impl Into<PathBuf>, factory: F)
    where
        F: Fn() -> HarnessResult<Arc<dyn Injectable>> + Send + Sync + 'static,
    {
        self.entries.insert(path.into(), Arc::new(factory));
    }

    /// Returns the registered keys.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }
}

impl BootstrapLoader for BootstrapRegistry {
    fn exists(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    fn load(&self, path: &Path) -> HarnessResult<Arc<dyn Injectable>> {
        let factory = self.entries.get(path).ok_or_else(|| {
            HarnessError::configuration(format!("Bootstrap {} is not registered", path.display()))
        })?;
        factory()
    }
}

impl fmt::Debug for BootstrapRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapRegistry")
            .field("paths", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves the application and checks it can handle requests.
pub fn require_application(
    application: &Arc<dyn Injectable>,
) -> HarnessResult<&dyn Application> {
    application
        .as_application()
        .ok_or_else(|| HarnessError::unsupported_application(application.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Plain;

    impl Injectable for Plain {
        fn di(&self) -> Option<Arc<Container>> {
            Some(Arc::new(Container::new()))
        }
    }

    struct Echo {
        di: Arc<Container>,
    }

    impl Injectable for Echo {
        fn di(&self) -> Option<Arc<Container>> {
            Some(Arc::clone(&self.di))
        }

        fn as_application(&self) -> Option<&dyn Application> {
            Some(self)
        }
    }

    impl Application for Echo {
        fn kind(&self) -> ApplicationKind {
            ApplicationKind::Micro
        }

        fn handle(&self, path: &str, _ctx: &ExecutionContext) -> HarnessResult<Handled> {
            Ok(Handled::Value(serde_json::Value::from(path)))
        }
    }

    #[test]
    fn test_plain_injectable_is_unsupported() {
        let app: Arc<dyn Injectable> = Arc::new(Plain);
        let err = require_application(&app).err().unwrap();
        assert!(matches!(err, HarnessError::UnsupportedApplication { .. }));
        assert!(err.to_string().contains("Plain"));
    }

    #[test]
    fn test_application_is_recognized() {
        let app: Arc<dyn Injectable> = Arc::new(Echo {
            di: Arc::new(Container::new()),
        });
        let handled = require_application(&app)
            .unwrap()
            .handle("/x", &ExecutionContext::new())
            .unwrap();
        assert_eq!(handled, Handled::Value("/x".into()));
    }

    #[test]
    fn test_factory_resolves_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let supplier = ApplicationSupplier::factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Plain) as Arc<dyn Injectable>)
        });

        let loader = BootstrapRegistry::new();
        supplier.resolve(&loader).unwrap();
        supplier.resolve(&loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_instance_resolves_same_value() {
        let supplier = ApplicationSupplier::instance(Plain);
        let loader = BootstrapRegistry::new();
        let a = supplier.resolve(&loader).unwrap();
        let b = supplier.resolve(&loader).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_bootstrap_registry() {
        let loader =
            BootstrapRegistry::new().with("app/bootstrap", || Ok(Arc::new(Plain) as Arc<dyn Injectable>));
        assert!(loader.exists(Path::new("app/bootstrap")));
        assert!(!loader.exists(Path::new("other")));

        let supplier = ApplicationSupplier::Bootstrap("app/bootstrap".into());
        assert!(supplier.resolve(&loader).is_ok());

        let missing = ApplicationSupplier::Bootstrap("other".into());
        let err = missing.resolve(&loader).err().unwrap();
        assert!(matches!(err, HarnessError::Configuration { .. }));
    }
}
