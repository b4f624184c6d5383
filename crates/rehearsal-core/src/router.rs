//! Named routes and URL generation.
//!
//! The [`Router`] is the container's `router` service; [`Url`] is the `url`
//! service that builds paths from route names. Patterns use `{name}`
//! placeholders for whole path segments.
//!
//! # Example
//!
//! ```rust
//! use rehearsal_core::router::{Route, Router, Url};
//! use std::sync::Arc;
//!
//! let router = Arc::new(
//!     Router::new()
//!         .route(Route::new("/").name("home"))
//!         .route(Route::new("/articles/{id}").name("article")),
//! );
//!
//! let matched = router.handle("/articles/42").unwrap();
//! assert_eq!(matched.route.route_name(), Some("article"));
//! assert_eq!(matched.params.get("id").map(String::as_str), Some("42"));
//!
//! let url = Url::new(router);
//! assert_eq!(url.for_route("article", &[("id", "7")]).unwrap(), "/articles/7");
//! ```

use crate::{HarnessError, HarnessResult};
use indexmap::IndexMap;
use parking_lot::Mutex;

/// A route definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pattern: String,
    name: Option<String>,
    hostname: Option<String>,
    methods: Vec<String>,
}

impl Route {
    /// Creates a route for a path pattern, matching any method.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            name: None,
            hostname: None,
            methods: Vec::new(),
        }
    }

    /// Names the route.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the route to a hostname.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Restricts the route to the given methods.
    #[must_use]
    pub fn via(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| m.to_uppercase()).collect();
        self
    }

    /// Returns the pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the route name.
    #[must_use]
    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the hostname constraint.
    #[must_use]
    pub fn hostname_value(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    fn allows(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    fn capture(&self, path: &str) -> Option<IndexMap<String, String>> {
        let pattern: Vec<&str> = segments(&self.pattern).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = IndexMap::new();
        for (expected, value) in pattern.iter().zip(&actual) {
            match placeholder(expected) {
                Some(name) => {
                    params.insert(name.to_string(), crate::params::decode_component(value));
                }
                None if expected == value => {}
                None => return None,
            }
        }
        Some(params)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

/// A successful route match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The matched route.
    pub route: Route,
    /// Captured placeholder values.
    pub params: IndexMap<String, String>,
}

/// The container's `router` service.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    matched: Mutex<Option<RouteMatch>>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns every route in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Looks up a route by name.
    #[must_use]
    pub fn route_by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.route_name() == Some(name))
    }

    /// Matches a path for any method and records the match.
    pub fn handle(&self, path: &str) -> Option<RouteMatch> {
        self.handle_method("GET", path)
    }

    /// Matches a path and method and records the match.
    pub fn handle_method(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let path = path.split('?').next().unwrap_or_default();
        let found = self.routes.iter().find_map(|route| {
            if !route.allows(method) {
                return None;
            }
            route.capture(path).map(|params| RouteMatch {
                route: route.clone(),
                params,
            })
        });
        self.matched.lock().clone_from(&found);
        found
    }

    /// Returns the route matched by the last [`Router::handle`] call.
    #[must_use]
    pub fn matched_route(&self) -> Option<RouteMatch> {
        self.matched.lock().clone()
    }
}

/// The container's `url` service.
#[derive(Debug, Clone)]
pub struct Url {
    router: std::sync::Arc<Router>,
    base_uri: String,
}

impl Url {
    /// Creates a URL builder over a router with base URI `/`.
    #[must_use]
    pub fn new(router: std::sync::Arc<Router>) -> Self {
        Self {
            router,
            base_uri: "/".to_string(),
        }
    }

    /// Sets the base URI prepended to generated paths.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Builds the path of a named route.
    ///
    /// Placeholders are filled from `params`; the remaining parameters are
    /// appended as a query string.
    pub fn for_route(&self, name: &str, params: &[(&str, &str)]) -> HarnessResult<String> {
        let route = self.router.route_by_name(name).ok_or_else(|| {
            HarnessError::configuration(format!("Route {name} is not defined"))
        })?;

        let mut used = Vec::new();
        let mut path_segments = Vec::new();
        for segment in segments(route.pattern()) {
            match placeholder(segment) {
                Some(placeholder) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == placeholder)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            HarnessError::configuration(format!(
                                "Route {name} requires parameter {placeholder}"
                            ))
                        })?;
                    used.push(placeholder);
                    path_segments.push(urlencoding::encode(value).into_owned());
                }
                None => path_segments.push(segment.to_string()),
            }
        }

        let base = self.base_uri.trim_end_matches('/');
        let mut url = format!("{base}/{}", path_segments.join("/"));

        let extra: Vec<String> = params
            .iter()
            .filter(|(key, _)| !used.contains(key))
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    crate::params::encode_component(key),
                    crate::params::encode_component(value)
                )
            })
            .collect();
        if !extra.is_empty() {
            url.push('?');
            url.push_str(&extra.join("&"));
        }
        Ok(url)
    }
}
