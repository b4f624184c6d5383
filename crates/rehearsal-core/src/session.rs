//! Session capability.
//!
//! A [`SessionService`] is the container's `session` service. It owns a
//! [`SessionAdapter`] that stores the values and consults
//! [`SessionService::exists`] before every read or write. The standard
//! manager reports a session only when a transport-level session (headers and
//! a session cookie) was started, which never happens in-process; the test
//! manager in `rehearsal-session` overrides that check.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// A session manager as stored in the container's `session` service.
pub type SharedSession = Arc<dyn SessionService>;

/// Errors raised by the session service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A transport-level session could not be started.
    #[error("Cannot start session: {message}")]
    Transport {
        /// Why the session could not be started.
        message: String,
    },

    /// The manager has no adapter attached.
    #[error("No session adapter is attached to the manager")]
    NoAdapter,

    /// No adapter is registered under the name.
    #[error("Unknown session adapter: {name}")]
    UnknownAdapter {
        /// Adapter name.
        name: String,
    },
}

impl SessionError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an unknown adapter error.
    #[must_use]
    pub fn unknown_adapter(name: impl Into<String>) -> Self {
        Self::UnknownAdapter { name: name.into() }
    }
}

/// Whether a session is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The session is started.
    Active,
    /// No session is started.
    None,
}

/// Session storage.
///
/// Adapters use interior mutability; the same instance is shared by the
/// manager and by tests inspecting it.
pub trait SessionAdapter: Send + Sync {
    /// Starts the session. Returns `false` if it is already active.
    fn start(&self) -> bool;

    /// Reads a value, returning `default` when the key is missing.
    ///
    /// With `remove`, the key is deleted after it is read.
    fn get(&self, key: &str, default: Option<Value>, remove: bool) -> Option<Value>;

    /// Stores a value.
    fn set(&self, key: &str, value: Value);

    /// Returns `true` if the key is set.
    fn has(&self, key: &str) -> bool;

    /// Deletes a key.
    fn remove(&self, key: &str);

    /// Returns the session id.
    fn id(&self) -> String;

    /// Replaces the session id.
    fn set_id(&self, id: &str);

    /// Returns the session name.
    fn name(&self) -> String;

    /// Sets the session name.
    fn set_name(&self, name: &str);

    /// Returns the adapter options.
    fn options(&self) -> Map<String, Value>;

    /// Replaces the adapter options.
    fn set_options(&self, options: Map<String, Value>);

    /// Returns the session status.
    fn status(&self) -> SessionStatus;

    /// Returns `true` while the session is active.
    fn is_started(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    /// Clears the session and marks it inactive.
    fn destroy(&self) -> bool;

    /// Switches to a freshly generated id and returns it.
    fn regenerate_id(&self) -> String;

    /// Persistence hook: reads serialized session data.
    fn read(&self, id: &str) -> String;

    /// Persistence hook: writes serialized session data.
    fn write(&self, id: &str, data: &str) -> bool;

    /// Returns every stored entry, keys as stored.
    fn to_array(&self) -> Map<String, Value>;
}

/// The container's `session` service.
pub trait SessionService: Send + Sync {
    /// Returns the attached adapter.
    fn adapter(&self) -> Option<Arc<dyn SessionAdapter>>;

    /// Attaches an adapter, replacing the previous one.
    fn set_adapter(&self, adapter: Arc<dyn SessionAdapter>);

    /// Returns `true` if a session exists for the current request.
    fn exists(&self) -> bool;

    /// Starts the session.
    ///
    /// An existing session is reported as started without touching the
    /// adapter.
    fn start(&self) -> Result<bool, SessionError> {
        if self.exists() {
            return Ok(true);
        }
        Ok(require_adapter(self)?.start())
    }

    /// Reads a value; `default` when there is no session or no such key.
    fn get(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, SessionError> {
        if !self.exists() {
            return Ok(default);
        }
        Ok(require_adapter(self)?.get(key, default, false))
    }

    /// Stores a value. Ignored when there is no session.
    fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        if self.exists() {
            require_adapter(self)?.set(key, value);
        }
        Ok(())
    }

    /// Returns `true` if the key is set in an existing session.
    fn has(&self, key: &str) -> Result<bool, SessionError> {
        if !self.exists() {
            return Ok(false);
        }
        Ok(require_adapter(self)?.has(key))
    }

    /// Deletes a key. Ignored when there is no session.
    fn remove(&self, key: &str) -> Result<(), SessionError> {
        if self.exists() {
            require_adapter(self)?.remove(key);
        }
        Ok(())
    }

    /// Destroys the session data.
    fn destroy(&self) -> Result<bool, SessionError> {
        Ok(require_adapter(self)?.destroy())
    }

    /// Switches the session to a new id.
    fn regenerate_id(&self) -> Result<String, SessionError> {
        Ok(require_adapter(self)?.regenerate_id())
    }

    /// Returns the session status as reported by the adapter.
    fn status(&self) -> SessionStatus {
        self.adapter()
            .map_or(SessionStatus::None, |adapter| adapter.status())
    }
}

fn require_adapter<S: SessionService + ?Sized>(
    service: &S,
) -> Result<Arc<dyn SessionAdapter>, SessionError> {
    service.adapter().ok_or(SessionError::NoAdapter)
}

/// The framework's session manager.
///
/// A session exists only once it has been started over a real transport,
/// which an in-process request never does, so [`SessionService::start`]
/// fails and reads fall back to their defaults.
#[derive(Default)]
pub struct StandardSessionManager {
    adapter: RwLock<Option<Arc<dyn SessionAdapter>>>,
}

impl StandardSessionManager {
    /// Creates a manager with no adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with `adapter` attached.
    #[must_use]
    pub fn with_adapter(adapter: Arc<dyn SessionAdapter>) -> Self {
        Self {
            adapter: RwLock::new(Some(adapter)),
        }
    }
}

impl std::fmt::Debug for StandardSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardSessionManager")
            .field("has_adapter", &self.adapter.read().is_some())
            .finish()
    }
}

impl SessionService for StandardSessionManager {
    fn adapter(&self) -> Option<Arc<dyn SessionAdapter>> {
        self.adapter.read().clone()
    }

    fn set_adapter(&self, adapter: Arc<dyn SessionAdapter>) {
        *self.adapter.write() = Some(adapter);
    }

    fn exists(&self) -> bool {
        false
    }

    fn start(&self) -> Result<bool, SessionError> {
        Err(SessionError::transport(
            "no transport is available to send the session cookie",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MapAdapter {
        data: Mutex<Map<String, Value>>,
    }

    impl SessionAdapter for MapAdapter {
        fn start(&self) -> bool {
            true
        }
        fn get(&self, key: &str, default: Option<Value>, _remove: bool) -> Option<Value> {
            self.data.lock().get(key).cloned().or(default)
        }
        fn set(&self, key: &str, value: Value) {
            self.data.lock().insert(key.to_string(), value);
        }
        fn has(&self, key: &str) -> bool {
            self.data.lock().contains_key(key)
        }
        fn remove(&self, key: &str) {
            self.data.lock().remove(key);
        }
        fn id(&self) -> String {
            "fixed".into()
        }
        fn set_id(&self, _id: &str) {}
        fn name(&self) -> String {
            "PHPSESSID".into()
        }
        fn set_name(&self, _name: &str) {}
        fn options(&self) -> Map<String, Value> {
            Map::new()
        }
        fn set_options(&self, _options: Map<String, Value>) {}
        fn status(&self) -> SessionStatus {
            SessionStatus::Active
        }
        fn destroy(&self) -> bool {
            self.data.lock().clear();
            true
        }
        fn regenerate_id(&self) -> String {
            "fixed".into()
        }
        fn read(&self, _id: &str) -> String {
            String::new()
        }
        fn write(&self, _id: &str, _data: &str) -> bool {
            true
        }
        fn to_array(&self) -> Map<String, Value> {
            self.data.lock().clone()
        }
    }

    struct AlwaysExists(StandardSessionManager);

    impl SessionService for AlwaysExists {
        fn adapter(&self) -> Option<Arc<dyn SessionAdapter>> {
            self.0.adapter()
        }
        fn set_adapter(&self, adapter: Arc<dyn SessionAdapter>) {
            self.0.set_adapter(adapter);
        }
        fn exists(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_standard_manager_cannot_start() {
        let manager = StandardSessionManager::with_adapter(Arc::new(MapAdapter::default()));
        let err = manager.start().unwrap_err();
        assert!(matches!(err, SessionError::Transport { .. }));
    }

    #[test]
    fn test_standard_manager_ignores_writes() {
        let manager = StandardSessionManager::with_adapter(Arc::new(MapAdapter::default()));
        manager.set("user", Value::from("ann")).unwrap();
        assert!(!manager.has("user").unwrap());
        assert_eq!(
            manager.get("user", Some(Value::from("none"))).unwrap(),
            Some(Value::from("none"))
        );
    }

    #[test]
    fn test_existing_session_reads_and_writes() {
        let manager = AlwaysExists(StandardSessionManager::new());
        manager.set_adapter(Arc::new(MapAdapter::default()));
        assert!(manager.start().unwrap());

        manager.set("user", Value::from("ann")).unwrap();
        assert!(manager.has("user").unwrap());
        assert_eq!(manager.get("user", None).unwrap(), Some(Value::from("ann")));

        manager.remove("user").unwrap();
        assert!(!manager.has("user").unwrap());
    }

    #[test]
    fn test_missing_adapter() {
        let manager = AlwaysExists(StandardSessionManager::new());
        assert_eq!(manager.set("a", Value::Null), Err(SessionError::NoAdapter));
        assert_eq!(manager.status(), SessionStatus::None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"active\""
        );
    }
}
