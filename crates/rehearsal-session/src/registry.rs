//! Session adapters by name.
//!
//! Configuration names the adapter to install for every test (`memory` by
//! default). The registry maps that name to a constructor; the lifecycle
//! controller resolves the constructor once and calls it before each test.

use crate::MemorySession;
use indexmap::IndexMap;
use rehearsal_core::session::{SessionAdapter, SessionError};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Name of the in-memory adapter.
pub const MEMORY_ADAPTER: &str = "memory";

/// Builds a fresh adapter from options.
pub type AdapterFactory = Arc<dyn Fn(&Map<String, Value>) -> Arc<dyn SessionAdapter> + Send + Sync>;

/// Adapter constructors by name.
///
/// # Example
///
/// ```rust
/// use rehearsal_core::session::SessionAdapter;
/// use rehearsal_session::AdapterRegistry;
/// use serde_json::Map;
///
/// let registry = AdapterRegistry::default();
/// let factory = registry.resolve("memory").unwrap();
/// let first = factory(&Map::new());
/// let second = factory(&Map::new());
/// assert_ne!(first.id(), second.id());
/// ```
#[derive(Clone)]
pub struct AdapterRegistry {
    factories: IndexMap<String, AdapterFactory>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::empty().with(MEMORY_ADAPTER, |options| {
            Arc::new(MemorySession::with_options(options.clone())) as Arc<dyn SessionAdapter>
        })
    }
}

impl AdapterRegistry {
    /// Creates a registry without the built-in adapter.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Registers a constructor.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Arc<dyn SessionAdapter> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Registers a constructor, replacing any previous one under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Arc<dyn SessionAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Looks up a constructor.
    pub fn resolve(&self, name: &str) -> Result<AdapterFactory, SessionError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::unknown_adapter(name))
    }

    /// Returns the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_has_memory() {
        let registry = AdapterRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec![MEMORY_ADAPTER]);
    }

    #[test]
    fn test_unknown_adapter() {
        let err = AdapterRegistry::empty().resolve("redis").err().unwrap();
        assert_eq!(err, SessionError::unknown_adapter("redis"));
    }

    #[test]
    fn test_options_reach_adapter() {
        let factory = AdapterRegistry::default().resolve(MEMORY_ADAPTER).unwrap();
        let options = json!({"uniqueId": "worker-1"});
        let adapter = factory(options.as_object().unwrap());
        assert_eq!(adapter.id(), "worker-1");
    }

    #[test]
    fn test_each_call_builds_fresh_adapter() {
        let factory = AdapterRegistry::default().resolve(MEMORY_ADAPTER).unwrap();
        let first = factory(&Map::new());
        first.set("a", json!(1));
        let second = factory(&Map::new());
        assert!(!second.has("a"));
    }

    #[test]
    fn test_custom_adapter() {
        let registry = AdapterRegistry::empty().with("fixed", |_| {
            let session = MemorySession::new();
            session.set_id("fixed");
            Arc::new(session) as Arc<dyn SessionAdapter>
        });
        let adapter = registry.resolve("fixed").unwrap()(&Map::new());
        assert_eq!(adapter.id(), "fixed");
    }
}
