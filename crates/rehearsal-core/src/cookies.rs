//! The framework cookie jar.
//!
//! Application code sets cookies on the [`Cookies`] service while handling a
//! request and reads incoming ones through it. Cookies read from the request
//! are marked *restored*; everything else was created during the request and
//! is reported by [`Cookies::new_cookies`], which is what the connector turns
//! into `Set-Cookie` lines.
//!
//! # Example
//!
//! ```rust
//! use rehearsal_core::cookies::{Cookies, Cookie};
//! use indexmap::IndexMap;
//!
//! let jar = Cookies::new();
//! jar.set(Cookie::new("theme", "dark").path("/"));
//!
//! let mut incoming = IndexMap::new();
//! incoming.insert("token".to_string(), "abc".to_string());
//! assert_eq!(jar.get("token", &incoming).map(|c| c.value().to_string()), Some("abc".into()));
//!
//! let fresh = jar.new_cookies();
//! assert_eq!(fresh.len(), 1);
//! assert_eq!(fresh[0].name(), "theme");
//! ```

use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A single cookie held by the jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    name: String,
    value: String,
    expire: i64,
    path: String,
    domain: String,
    secure: bool,
    http_only: bool,
    restored: bool,
}

impl Cookie {
    /// Creates a session cookie (no expiry) on path `/`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expire: 0,
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            http_only: true,
            restored: false,
        }
    }

    /// Sets the expiry as a Unix timestamp; `0` means a session cookie.
    #[must_use]
    pub fn expire(mut self, timestamp: i64) -> Self {
        self.expire = timestamp;
        self
    }

    /// Sets the Path attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the Domain attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the Secure attribute.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the `HttpOnly` attribute.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Get the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the expiry timestamp.
    #[must_use]
    pub fn expiration(&self) -> i64 {
        self.expire
    }

    /// Get the path.
    #[must_use]
    pub fn path_value(&self) -> &str {
        &self.path
    }

    /// Get the domain.
    #[must_use]
    pub fn domain_value(&self) -> &str {
        &self.domain
    }

    /// Get the Secure flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Get the `HttpOnly` flag.
    #[must_use]
    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Returns `true` if the cookie was read from the incoming request.
    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Formats the cookie as a `Set-Cookie` header value.
    ///
    /// The value is percent-encoded; the expiry is written in
    /// `D, d M Y H:i:s GMT` form and omitted for session cookies.
    #[must_use]
    pub fn to_set_cookie(&self) -> String {
        let mut line = format!("{}={}", self.name, urlencoding::encode(&self.value));

        if self.expire != 0 {
            if let Some(expires) = Utc.timestamp_opt(self.expire, 0).single() {
                line.push_str("; expires=");
                line.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
            }
        }
        if !self.domain.is_empty() {
            line.push_str("; domain=");
            line.push_str(&self.domain);
        }
        if !self.path.is_empty() {
            line.push_str("; path=");
            line.push_str(&self.path);
        }
        if self.secure {
            line.push_str("; secure");
        }
        if self.http_only {
            line.push_str("; httponly");
        }
        line
    }
}

#[derive(Debug)]
struct JarState {
    use_encryption: bool,
    cookies: IndexMap<String, Cookie>,
}

/// The container's `cookies` service.
#[derive(Debug)]
pub struct Cookies {
    state: Mutex<JarState>,
}

impl Default for Cookies {
    fn default() -> Self {
        Self::new()
    }
}

impl Cookies {
    /// Creates an empty jar with encryption enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JarState {
                use_encryption: true,
                cookies: IndexMap::new(),
            }),
        }
    }

    /// Enables or disables value encryption.
    pub fn use_encryption(&self, enabled: bool) {
        self.state.lock().use_encryption = enabled;
    }

    /// Returns `true` if values are encrypted.
    #[must_use]
    pub fn is_using_encryption(&self) -> bool {
        self.state.lock().use_encryption
    }

    /// Stores a cookie created during the current request.
    pub fn set(&self, cookie: Cookie) {
        let mut cookie = cookie;
        cookie.restored = false;
        self.state.lock().cookies.insert(cookie.name.clone(), cookie);
    }

    /// Returns a cookie, restoring it from `incoming` when the jar does not
    /// hold it yet.
    pub fn get(&self, name: &str, incoming: &IndexMap<String, String>) -> Option<Cookie> {
        let mut state = self.state.lock();
        if let Some(cookie) = state.cookies.get(name) {
            return Some(cookie.clone());
        }
        let value = incoming.get(name)?;
        let mut cookie = Cookie::new(name, value.clone());
        cookie.restored = true;
        state.cookies.insert(name.to_string(), cookie.clone());
        Some(cookie)
    }

    /// Returns `true` if the jar or the incoming cookies hold `name`.
    #[must_use]
    pub fn has(&self, name: &str, incoming: &IndexMap<String, String>) -> bool {
        self.state.lock().cookies.contains_key(name) || incoming.contains_key(name)
    }

    /// Expires a cookie by replacing it with an empty, already expired one.
    pub fn delete(&self, name: &str) {
        let expired = {
            let state = self.state.lock();
            state
                .cookies
                .get(name)
                .cloned()
                .unwrap_or_else(|| Cookie::new(name, ""))
        };
        self.set(Cookie {
            value: String::new(),
            expire: 1,
            ..expired
        });
    }

    /// Returns the cookies created during the current request.
    #[must_use]
    pub fn new_cookies(&self) -> Vec<Cookie> {
        self.state
            .lock()
            .cookies
            .values()
            .filter(|c| !c.restored)
            .cloned()
            .collect()
    }

    /// Removes every cookie from the jar.
    pub fn reset(&self) {
        self.state.lock().cookies.clear();
    }
}
