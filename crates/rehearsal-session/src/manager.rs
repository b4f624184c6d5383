//! The session manager used during tests.

use rehearsal_core::session::{SessionAdapter, SessionService, StandardSessionManager};
use std::sync::Arc;

/// A session manager that always reports an existing session.
///
/// The standard manager only sees a session after starting one over a real
/// transport. This manager wraps it and answers [`SessionService::exists`]
/// with `true`, so reads and writes go straight to the adapter during
/// in-process requests. Everything else is the wrapped manager's behavior.
///
/// # Example
///
/// ```rust
/// use rehearsal_core::session::SessionService;
/// use rehearsal_session::{MemorySession, TestSessionManager};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let manager = TestSessionManager::with_adapter(Arc::new(MemorySession::new()));
/// manager.set("cart", json!([1, 2])).unwrap();
/// assert_eq!(manager.get("cart", None).unwrap(), Some(json!([1, 2])));
/// ```
#[derive(Debug, Default)]
pub struct TestSessionManager {
    inner: StandardSessionManager,
}

impl TestSessionManager {
    /// Creates a manager with no adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with `adapter` attached.
    #[must_use]
    pub fn with_adapter(adapter: Arc<dyn SessionAdapter>) -> Self {
        Self {
            inner: StandardSessionManager::with_adapter(adapter),
        }
    }
}

impl SessionService for TestSessionManager {
    fn adapter(&self) -> Option<Arc<dyn SessionAdapter>> {
        self.inner.adapter()
    }

    fn set_adapter(&self, adapter: Arc<dyn SessionAdapter>) {
        self.inner.set_adapter(adapter);
    }

    fn exists(&self) -> bool {
        true
    }
}
