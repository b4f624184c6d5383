//! Execution context types.
//!
//! The [`ExecutionContext`] carries the request state a framework would
//! otherwise read from process-wide globals (server variables, query and body
//! parameters, cookies, uploads, session data) together with the default
//! container slot. It is passed by reference into the connector and the
//! lifecycle controller, so two contexts never observe each other.

use crate::di::Container;
use crate::params::ParamMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Upload metadata keyed by field, then by attribute (`name`, `tmp_name`,
/// `error`, `size`, `type`).
pub type FileMap = IndexMap<String, ParamMap>;

/// The ambient request state consumed by framework code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbientState {
    /// Server variables (`REQUEST_METHOD`, `REQUEST_URI`, `HTTP_HOST`, ...).
    pub server: IndexMap<String, String>,
    /// Query parameters.
    pub get: ParamMap,
    /// Body parameters.
    pub post: ParamMap,
    /// Combined request parameters.
    pub request: ParamMap,
    /// Incoming cookies.
    pub cookies: IndexMap<String, String>,
    /// Uploaded files in nested field shape.
    pub files: FileMap,
    /// Session data.
    pub session: serde_json::Map<String, serde_json::Value>,
    /// The query string rebuilt from the final GET bucket.
    pub query_string: String,
}

impl AmbientState {
    /// Creates an empty ambient state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a server variable.
    #[must_use]
    pub fn server_var(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    /// Returns `true` when every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
            && self.get.is_empty()
            && self.post.is_empty()
            && self.request.is_empty()
            && self.cookies.is_empty()
            && self.files.is_empty()
            && self.session.is_empty()
            && self.query_string.is_empty()
    }

    /// Empties every bucket.
    pub fn clear(&mut self) {
        self.server.clear();
        self.get.clear();
        self.post.clear();
        self.request.clear();
        self.cookies.clear();
        self.files.clear();
        self.session.clear();
        self.query_string.clear();
    }
}

/// Per-worker execution state shared by the connector and the lifecycle
/// controller.
///
/// # Example
///
/// ```
/// use rehearsal_core::{ExecutionContext, di::Container};
/// use std::sync::Arc;
///
/// let mut ctx = ExecutionContext::new();
/// ctx.set_default(Arc::new(Container::new()));
/// assert!(ctx.default_container().is_some());
///
/// ctx.reset_default();
/// assert!(ctx.default_container().is_none());
/// ```
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// The ambient request state.
    pub ambient: AmbientState,

    /// The container visible to framework code as "the default".
    default_container: Option<Arc<Container>>,
}

impl ExecutionContext {
    /// Creates a context with empty ambient state and no default container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default container.
    #[must_use]
    pub fn default_container(&self) -> Option<&Arc<Container>> {
        self.default_container.as_ref()
    }

    /// Makes `container` the default container.
    pub fn set_default(&mut self, container: Arc<Container>) {
        self.default_container = Some(container);
    }

    /// Clears the default container slot.
    pub fn reset_default(&mut self) {
        self.default_container = None;
    }

    /// Empties every ambient bucket.
    pub fn clear_ambient(&mut self) {
        self.ambient.clear();
    }

    /// Returns `true` if neither ambient state nor a default container remain.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.default_container.is_none() && self.ambient.is_empty()
    }
}
