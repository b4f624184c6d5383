//! Volatile session storage.

use chrono::Utc;
use parking_lot::Mutex;
use rehearsal_core::session::{SessionAdapter, SessionStatus};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use std::sync::atomic::{AtomicU64, Ordering};

/// Option key that selects the session id.
pub const UNIQUE_ID_OPTION: &str = "uniqueId";

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a session id: the SHA-1 of the current time.
///
/// A process-wide sequence number is mixed in so two ids generated within
/// the same clock tick still differ.
#[must_use]
pub fn generate_id() -> String {
    let now = Utc::now();
    let sequence = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let seed = format!(
        "{}.{:09}.{sequence}",
        now.timestamp(),
        now.timestamp_subsec_nanos()
    );
    format!("{:x}", Sha1::digest(seed.as_bytes()))
}

#[derive(Debug)]
struct State {
    id: String,
    name: String,
    options: Map<String, Value>,
    started: bool,
    memory: Map<String, Value>,
}

/// A session adapter that keeps everything in memory.
///
/// Keys are stored as `<session id>#<key>`, so changing the id (through the
/// `uniqueId` option or [`SessionAdapter::regenerate_id`]) switches to an
/// empty key space; old entries stay in memory but are no longer reachable.
///
/// # Example
///
/// ```rust
/// use rehearsal_core::session::SessionAdapter;
/// use rehearsal_session::MemorySession;
/// use serde_json::json;
///
/// let session = MemorySession::new();
/// assert!(session.start());
/// assert!(!session.start());
///
/// session.set("user", json!("ann"));
/// assert_eq!(session.get("user", None, false), Some(json!("ann")));
///
/// session.regenerate_id();
/// assert_eq!(session.get("user", Some(json!("gone")), false), Some(json!("gone")));
/// ```
#[derive(Debug)]
pub struct MemorySession {
    state: Mutex<State>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    /// Creates an inactive session with a generated id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                id: generate_id(),
                name: "PHPSESSID".to_string(),
                options: Map::new(),
                started: false,
                memory: Map::new(),
            }),
        }
    }

    /// Creates an inactive session configured with `options`.
    #[must_use]
    pub fn with_options(options: Map<String, Value>) -> Self {
        let session = Self::new();
        session.set_options(options);
        session
    }

    fn key(state: &State, key: &str) -> String {
        if state.id.is_empty() {
            key.to_string()
        } else {
            format!("{}#{key}", state.id)
        }
    }
}

impl SessionAdapter for MemorySession {
    fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.started {
            return false;
        }
        state.memory.clear();
        state.started = true;
        true
    }

    fn get(&self, key: &str, default: Option<Value>, remove: bool) -> Option<Value> {
        let mut state = self.state.lock();
        let key = Self::key(&state, key);
        if !state.memory.get(&key).is_some_and(|value| !value.is_null()) {
            return default;
        }
        if remove {
            state.memory.remove(&key)
        } else {
            state.memory.get(&key).cloned()
        }
    }

    fn set(&self, key: &str, value: Value) {
        let mut state = self.state.lock();
        let key = Self::key(&state, key);
        state.memory.insert(key, value);
    }

    fn has(&self, key: &str) -> bool {
        let state = self.state.lock();
        state
            .memory
            .get(&Self::key(&state, key))
            .is_some_and(|value| !value.is_null())
    }

    fn remove(&self, key: &str) {
        let mut state = self.state.lock();
        let key = Self::key(&state, key);
        state.memory.remove(&key);
    }

    fn id(&self) -> String {
        self.state.lock().id.clone()
    }

    fn set_id(&self, id: &str) {
        self.state.lock().id = id.to_string();
    }

    fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    fn set_name(&self, name: &str) {
        self.state.lock().name = name.to_string();
    }

    fn options(&self) -> Map<String, Value> {
        self.state.lock().options.clone()
    }

    fn set_options(&self, options: Map<String, Value>) {
        let mut state = self.state.lock();
        if let Some(id) = options.get(UNIQUE_ID_OPTION) {
            state.id = match id {
                Value::String(id) => id.clone(),
                other => other.to_string(),
            };
        }
        state.options = options;
    }

    fn status(&self) -> SessionStatus {
        if self.state.lock().started {
            SessionStatus::Active
        } else {
            SessionStatus::None
        }
    }

    fn destroy(&self) -> bool {
        let mut state = self.state.lock();
        state.memory.clear();
        state.started = false;
        tracing::debug!(id = %state.id, "session destroyed");
        true
    }

    fn regenerate_id(&self) -> String {
        let id = generate_id();
        let previous = std::mem::replace(&mut self.state.lock().id, id.clone());
        tracing::debug!(previous = %previous, id = %id, "session id regenerated");
        id
    }

    fn read(&self, _id: &str) -> String {
        String::new()
    }

    fn write(&self, _id: &str, _data: &str) -> bool {
        true
    }

    fn to_array(&self) -> Map<String, Value> {
        self.state.lock().memory.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids_are_sha1_hex() {
        let id = generate_id();
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_start_once_per_destroy_cycle() {
        let session = MemorySession::new();
        assert_eq!(session.status(), SessionStatus::None);
        assert!(session.start());
        assert!(session.is_started());
        assert!(!session.start());

        assert!(session.destroy());
        assert_eq!(session.status(), SessionStatus::None);
        assert!(session.start());
    }

    #[test]
    fn test_start_clears_storage() {
        let session = MemorySession::new();
        session.set("a", json!(1));
        session.start();
        assert!(!session.has("a"));
    }

    #[test]
    fn test_destroy_clears_storage() {
        let session = MemorySession::new();
        session.start();
        session.set("a", json!(1));
        session.destroy();
        assert!(!session.has("a"));
        assert!(session.to_array().is_empty());
    }

    #[test]
    fn test_get_with_remove() {
        let session = MemorySession::new();
        session.set("flash", json!("saved"));
        assert_eq!(session.get("flash", None, true), Some(json!("saved")));
        assert_eq!(session.get("flash", None, false), None);
    }

    #[test]
    fn test_null_values_read_as_missing() {
        let session = MemorySession::new();
        session.set("gone", Value::Null);
        assert!(!session.has("gone"));
        assert_eq!(session.get("gone", Some(json!("fallback")), false), Some(json!("fallback")));
        assert_eq!(session.get("gone", None, true), None);
    }

    #[test]
    fn test_empty_id_uses_bare_keys() {
        let session = MemorySession::new();
        session.set_id("");
        session.set("user", json!("ann"));
        assert!(session.to_array().contains_key("user"));
        assert_eq!(session.get("user", None, false), Some(json!("ann")));
    }

    #[test]
    fn test_keys_are_namespaced_by_id() {
        let session = MemorySession::with_options(
            json!({"uniqueId": "abc"}).as_object().cloned().unwrap_or_default(),
        );
        session.set("user", json!("ann"));
        assert_eq!(session.id(), "abc");
        assert!(session.to_array().contains_key("abc#user"));
        assert_eq!(session.options()["uniqueId"], json!("abc"));
    }

    #[test]
    fn test_set_options_switches_key_space() {
        let session = MemorySession::new();
        session.set("user", json!("ann"));
        session.set_options(json!({"uniqueId": "other"}).as_object().cloned().unwrap_or_default());
        assert!(!session.has("user"));
        assert_eq!(session.get("user", Some(json!(0)), false), Some(json!(0)));
    }

    #[test]
    fn test_set_id_and_name() {
        let session = MemorySession::new();
        session.set_id("fixed");
        session.set_name("SID");
        assert_eq!(session.id(), "fixed");
        assert_eq!(session.name(), "SID");
    }

    #[test]
    fn test_persistence_hooks_are_noops() {
        let session = MemorySession::new();
        session.set("a", json!(1));
        assert_eq!(session.read("anything"), "");
        assert!(session.write("anything", "data"));
        assert!(session.has("a"));
    }
}
