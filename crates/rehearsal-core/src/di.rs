//! Dependency injection container.
//!
//! The container maps service names to definitions. A definition is either a
//! ready instance or a factory that builds one on demand. Shared services cache
//! their first resolution; non-shared services are rebuilt on every
//! [`Container::get`].
//!
//! # Example
//!
//! ```rust
//! use rehearsal_core::di::{Container, ServiceDefinition};
//! use std::sync::Arc;
//!
//! struct Mailer {
//!     host: String,
//! }
//!
//! let container = Container::new();
//! container.set_shared(
//!     "mailer",
//!     ServiceDefinition::factory(|_| {
//!         Ok(Arc::new(Mailer {
//!             host: "localhost".to_string(),
//!         }))
//!     }),
//! );
//!
//! let mailer: Arc<Mailer> = container.get("mailer").unwrap();
//! assert_eq!(mailer.host, "localhost");
//! ```

use crate::{HarnessError, HarnessResult};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A resolved service instance.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// A factory that builds a service instance.
pub type ServiceFactory = Arc<dyn Fn(&Container) -> HarnessResult<ServiceInstance> + Send + Sync>;

/// How a service is produced.
#[derive(Clone)]
pub enum ServiceDefinition {
    /// A ready instance, returned as-is.
    Instance(ServiceInstance),
    /// A factory called on resolution.
    Factory(ServiceFactory),
}

impl ServiceDefinition {
    /// Wraps a ready instance.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Instance(Arc::new(value))
    }

    /// Wraps a factory.
    ///
    /// The factory receives the container, so it can pull in its own
    /// dependencies.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> HarnessResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(move |container| {
            factory(container).map(|service| service as ServiceInstance)
        }))
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("ServiceDefinition::Instance"),
            Self::Factory(_) => f.write_str("ServiceDefinition::Factory"),
        }
    }
}

/// A registered service.
pub struct Service {
    name: String,
    definition: ServiceDefinition,
    shared: bool,
    shared_instance: Mutex<Option<ServiceInstance>>,
}

impl Service {
    fn new(name: String, definition: ServiceDefinition, shared: bool) -> Self {
        Self {
            name,
            definition,
            shared,
            shared_instance: Mutex::new(None),
        }
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the service caches its first resolution.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Returns `true` once a shared instance has been built.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.shared_instance.lock().is_some()
    }

    /// Resolves the service.
    ///
    /// Shared services build once and return the cached instance afterwards.
    pub fn resolve(&self, container: &Container) -> HarnessResult<ServiceInstance> {
        if self.shared {
            self.resolve_shared(container)
        } else {
            self.build(container)
        }
    }

    fn resolve_shared(&self, container: &Container) -> HarnessResult<ServiceInstance> {
        if let Some(instance) = self.shared_instance.lock().as_ref() {
            return Ok(Arc::clone(instance));
        }
        // The factory may look up other services, so it runs without the lock held.
        let instance = self.build(container)?;
        let mut cached = self.shared_instance.lock();
        Ok(Arc::clone(cached.get_or_insert(instance)))
    }

    fn build(&self, container: &Container) -> HarnessResult<ServiceInstance> {
        match &self.definition {
            ServiceDefinition::Instance(instance) => Ok(Arc::clone(instance)),
            ServiceDefinition::Factory(factory) => factory(container),
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .field("shared", &self.shared)
            .finish()
    }
}

/// A named-service dependency injection container.
///
/// All methods take `&self`; the container is shared through `Arc` between
/// the application, the connector and the lifecycle controller.
#[derive(Default)]
pub struct Container {
    services: RwLock<IndexMap<String, Arc<Service>>>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous definition under `name`.
    pub fn set(
        &self,
        name: impl Into<String>,
        definition: ServiceDefinition,
        shared: bool,
    ) -> Arc<Service> {
        let name = name.into();
        let service = Arc::new(Service::new(name.clone(), definition, shared));
        self.services.write().insert(name, Arc::clone(&service));
        service
    }

    /// Registers a shared service.
    pub fn set_shared(&self, name: impl Into<String>, definition: ServiceDefinition) -> Arc<Service> {
        self.set(name, definition, true)
    }

    /// Registers a ready instance as a shared service.
    ///
    /// This is the array-style assignment (`di["name"] = value`).
    pub fn set_instance<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: Arc<T>) {
        self.set(name, ServiceDefinition::Instance(value), true);
    }

    /// Checks if a service is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// Removes a service, returning its definition if it was registered.
    pub fn remove(&self, name: &str) -> Option<Arc<Service>> {
        self.services.write().shift_remove(name)
    }

    /// Returns the registered service without resolving it.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.read().get(name).cloned()
    }

    /// Resolves a service honoring its shared flag.
    pub fn get_raw(&self, name: &str) -> HarnessResult<ServiceInstance> {
        self.lookup(name)?.resolve(self)
    }

    /// Resolves a service, always caching the instance.
    ///
    /// This is the array-style read (`di["name"]`).
    pub fn get_shared_raw(&self, name: &str) -> HarnessResult<ServiceInstance> {
        self.lookup(name)?.resolve_shared(self)
    }

    /// Resolves a service and downcasts it to `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> HarnessResult<Arc<T>> {
        Self::downcast(name, self.get_raw(name)?)
    }

    /// Resolves a service through the shared cache and downcasts it to `T`.
    pub fn get_shared<T: Send + Sync + 'static>(&self, name: &str) -> HarnessResult<Arc<T>> {
        Self::downcast(name, self.get_shared_raw(name)?)
    }

    /// Returns the registered service names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.services.read().keys().cloned().collect()
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    fn lookup(&self, name: &str) -> HarnessResult<Arc<Service>> {
        self.service(name)
            .ok_or_else(|| HarnessError::service_not_found(name))
    }

    fn downcast<T: Send + Sync + 'static>(
        name: &str,
        instance: ServiceInstance,
    ) -> HarnessResult<Arc<T>> {
        instance
            .downcast::<T>()
            .map_err(|_| HarnessError::service_type::<T>(name))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    fn counting_factory(counter: Arc<AtomicUsize>) -> ServiceDefinition {
        ServiceDefinition::factory(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(TestService {
                value: format!("build-{n}"),
            }))
        })
    }

    #[test]
    fn test_container_new() {
        let container = Container::new();
        assert!(container.is_empty());
        assert_eq!(container.len(), 0);
    }

    #[test]
    fn test_instance_register_and_get() {
        let container = Container::new();
        container.set_instance(
            "svc",
            Arc::new(TestService {
                value: "hello".to_string(),
            }),
        );

        let service: Arc<TestService> = container.get("svc").unwrap();
        assert_eq!(service.value, "hello");
        assert!(container.has("svc"));
    }

    #[test]
    fn test_non_shared_factory_builds_every_time() {
        let counter = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.set("svc", counting_factory(Arc::clone(&counter)), false);

        let first: Arc<TestService> = container.get("svc").unwrap();
        let second: Arc<TestService> = container.get("svc").unwrap();
        assert_eq!(first.value, "build-0");
        assert_eq!(second.value, "build-1");
    }

    #[test]
    fn test_shared_factory_builds_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.set_shared("svc", counting_factory(Arc::clone(&counter)));

        let first: Arc<TestService> = container.get("svc").unwrap();
        let second: Arc<TestService> = container.get("svc").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_shared_caches_non_shared_service() {
        let counter = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.set("svc", counting_factory(Arc::clone(&counter)), false);

        let first: Arc<TestService> = container.get_shared("svc").unwrap();
        let second: Arc<TestService> = container.get_shared("svc").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_factory_can_resolve_dependencies() {
        let container = Container::new();
        container.set_instance("prefix", Arc::new("dep".to_string()));
        container.set_shared(
            "svc",
            ServiceDefinition::factory(|c: &Container| {
                let prefix: Arc<String> = c.get("prefix")?;
                Ok(Arc::new(TestService {
                    value: format!("{prefix}-svc"),
                }))
            }),
        );

        let service: Arc<TestService> = container.get("svc").unwrap();
        assert_eq!(service.value, "dep-svc");
    }

    #[test]
    fn test_missing_service() {
        let container = Container::new();
        let err = container.get::<TestService>("nope").unwrap_err();
        assert!(matches!(err, HarnessError::ServiceNotFound { .. }));
    }

    #[test]
    fn test_wrong_type() {
        let container = Container::new();
        container.set_instance("svc", Arc::new(42_u32));
        let err = container.get::<TestService>("svc").unwrap_err();
        assert!(matches!(err, HarnessError::ServiceType { .. }));
    }

    #[test]
    fn test_set_replaces_and_remove() {
        let container = Container::new();
        container.set_instance("svc", Arc::new(1_u32));
        container.set_instance("svc", Arc::new(2_u32));
        assert_eq!(*container.get::<u32>("svc").unwrap(), 2);
        assert_eq!(container.len(), 1);

        assert!(container.remove("svc").is_some());
        assert!(!container.has("svc"));
        assert!(container.remove("svc").is_none());
    }

    #[test]
    fn test_service_resolve_returned_from_set() {
        let container = Container::new();
        let service = container.set(
            "answer",
            ServiceDefinition::factory(|_| Ok(Arc::new("yes".to_string()))),
            true,
        );
        assert!(!service.is_resolved());
        let resolved = service.resolve(&container).unwrap();
        assert!(service.is_resolved());
        assert_eq!(resolved.downcast::<String>().unwrap().as_str(), "yes");
    }

    #[test]
    fn test_container_debug() {
        let container = Container::new();
        container.set_instance("svc", Arc::new(1_u32));
        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("svc"));
    }
}
