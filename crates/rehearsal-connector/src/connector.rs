//! In-process request dispatch.

use crate::request::TestRequest;
use crate::response::TestResponse;
use crate::superglobals::{self, Target};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use indexmap::IndexMap;
use rehearsal_core::application::{
    require_application, ApplicationSupplier, BootstrapLoader, BootstrapRegistry, Handled,
    Injectable,
};
use rehearsal_core::cookies::Cookies;
use rehearsal_core::di::Container;
use rehearsal_core::http::{
    FrameworkRequest, HttpRequest, Response, SharedRequest, SharedResponse, UploadedFile,
};
use rehearsal_core::params::ParamValue;
use rehearsal_core::{AmbientState, ExecutionContext, HarnessError, HarnessResult};
use std::fmt;
use std::sync::Arc;

/// Host reported to applications unless overridden.
pub const DEFAULT_HOST: &str = "localhost";

/// Drives an application through simulated requests.
///
/// The connector never opens a socket: it rewrites the ambient request state
/// in the [`ExecutionContext`], installs a request object carrying the raw
/// body, calls the application's `handle` and converts whatever it produced
/// into a [`TestResponse`].
///
/// # Example
///
/// ```
/// use rehearsal_connector::{Connector, TestRequest};
/// use rehearsal_core::application::ApplicationSupplier;
/// use rehearsal_core::fixtures::{MemoryConnection, MvcApplication};
/// use rehearsal_core::ExecutionContext;
/// use std::sync::Arc;
///
/// let mut connector = Connector::new();
/// connector.set_application(ApplicationSupplier::instance(MvcApplication::new(Arc::new(
///     MemoryConnection::new(),
/// ))));
///
/// let mut ctx = ExecutionContext::new();
/// let request = TestRequest::get("/").param("name", "Ada").build().unwrap();
/// let response = connector.do_request(&request, &mut ctx).unwrap();
/// response.assert_status_code(200).assert_body_eq("Hello, Ada!");
/// ```
pub struct Connector {
    supplier: Option<ApplicationSupplier>,
    loader: Arc<dyn BootstrapLoader>,
    server: IndexMap<String, String>,
    current_uri: Option<String>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    /// Creates a connector with no application and an empty bootstrap loader.
    #[must_use]
    pub fn new() -> Self {
        Self::with_loader(Arc::new(BootstrapRegistry::new()))
    }

    /// Creates a connector resolving bootstrap suppliers through `loader`.
    #[must_use]
    pub fn with_loader(loader: Arc<dyn BootstrapLoader>) -> Self {
        let mut server = IndexMap::new();
        server.insert("HTTP_HOST".to_string(), DEFAULT_HOST.to_string());
        Self {
            supplier: None,
            loader,
            server,
            current_uri: None,
        }
    }

    /// Sets how the application is obtained.
    pub fn set_application(&mut self, supplier: ApplicationSupplier) {
        self.supplier = Some(supplier);
    }

    /// Clears the application supplier.
    pub fn clear_application(&mut self) {
        self.supplier = None;
    }

    /// Resolves the application.
    ///
    /// Factory and bootstrap suppliers are resolved anew on every call.
    pub fn application(&self) -> HarnessResult<Arc<dyn Injectable>> {
        self.supplier
            .as_ref()
            .ok_or_else(|| HarnessError::configuration("No application is attached to the connector"))?
            .resolve(self.loader.as_ref())
    }

    /// Replaces every default server variable.
    pub fn set_server_parameters(&mut self, server: IndexMap<String, String>) {
        self.server = server;
    }

    /// Sets one default server variable.
    pub fn set_server_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.server.insert(name.into(), value.into());
    }

    /// Returns a default server variable.
    #[must_use]
    pub fn server_parameter(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    /// Returns the `REQUEST_URI` of the last dispatched request.
    #[must_use]
    pub fn current_uri(&self) -> Option<&str> {
        self.current_uri.as_deref()
    }

    /// Forgets the request history.
    pub fn restart(&mut self) {
        self.current_uri = None;
    }

    /// Alias of [`do_request`](Self::do_request).
    pub fn request(
        &mut self,
        request: &TestRequest,
        ctx: &mut ExecutionContext,
    ) -> HarnessResult<TestResponse> {
        self.do_request(request, ctx)
    }

    /// Dispatches `request` to the application.
    ///
    /// The ambient state in `ctx` is rewritten for this request and the
    /// application's container becomes the default container. Both stay in
    /// place after the call so assertions can inspect them.
    pub fn do_request(
        &mut self,
        request: &TestRequest,
        ctx: &mut ExecutionContext,
    ) -> HarnessResult<TestResponse> {
        let injectable = self.application()?;
        let application = require_application(&injectable)?;
        let di = injectable.di().ok_or_else(|| {
            HarnessError::configuration(format!(
                "{} has no dependency injection container",
                injectable.type_name()
            ))
        })?;

        let existing = current_request(&di)?;
        let target = match request.uri() {
            Some(uri) => Target::parse(
                uri.path_and_query()
                    .map_or_else(|| uri.path(), |pq| pq.as_str()),
            ),
            None => Target::parse(
                &existing
                    .as_ref()
                    .map(|r| r.uri())
                    .or_else(|| self.current_uri.clone())
                    .unwrap_or_default(),
            ),
        };

        tracing::debug!(
            method = %request.method(),
            uri = %target.request_uri(),
            application = injectable.type_name(),
            "dispatching request"
        );

        ctx.ambient = superglobals::populate(request, &target, &self.server);
        ctx.reset_default();
        ctx.set_default(Arc::clone(&di));

        let base = existing.map_or_else(
            || Arc::new(HttpRequest::from_ambient(ctx.ambient.clone())) as SharedRequest,
            |r| r.rebind(&ctx.ambient),
        );
        let wrapped: SharedRequest = Arc::new(RawBodyRequest {
            inner: base,
            raw_body: request.content().clone(),
        });
        di.set_instance("request", Arc::new(wrapped));

        let response = match application.handle(&target.path, ctx)? {
            Handled::Response(response) => response,
            Handled::Value(_) | Handled::Nothing => {
                di.get_shared::<SharedResponse>("response")?.snapshot()
            }
        };

        self.current_uri = Some(target.request_uri());
        let test_response = convert(&response, &di)?;
        tracing::debug!(status = test_response.status_code(), "request handled");
        Ok(test_response)
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("supplier", &self.supplier)
            .field("server", &self.server)
            .field("current_uri", &self.current_uri)
            .finish_non_exhaustive()
    }
}

fn current_request(di: &Container) -> HarnessResult<Option<SharedRequest>> {
    if !di.has("request") {
        return Ok(None);
    }
    let request = di.get_shared::<SharedRequest>("request")?;
    Ok(Some(Arc::clone(request.as_ref())))
}

fn convert(response: &Response, di: &Container) -> HarnessResult<TestResponse> {
    let code = response.status_code().filter(|code| *code != 0).unwrap_or(200);
    let status = StatusCode::from_u16(code)
        .map_err(|e| HarnessError::invalid_header("Status", e.to_string()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in response.headers().iter() {
        let header_name = HeaderName::try_from(name)
            .map_err(|e| HarnessError::invalid_header(name, e.to_string()))?;
        let header_value = HeaderValue::try_from(value)
            .map_err(|e| HarnessError::invalid_header(name, e.to_string()))?;
        headers.append(header_name, header_value);
    }

    if di.has("cookies") {
        let cookies = di.get_shared::<Cookies>("cookies")?;
        for cookie in cookies.new_cookies() {
            let line = cookie.to_set_cookie();
            let value = HeaderValue::try_from(line.as_str())
                .map_err(|e| HarnessError::invalid_header("Set-Cookie", e.to_string()))?;
            headers.append(header::SET_COOKIE, value);
        }
    }

    let body = response.content().cloned().unwrap_or_default();
    Ok(TestResponse::new(status, headers, body))
}

/// The framework request installed for a dispatch: the framework's own
/// request object with the test request's raw body attached.
struct RawBodyRequest {
    inner: SharedRequest,
    raw_body: Bytes,
}

impl FrameworkRequest for RawBodyRequest {
    fn uri(&self) -> String {
        self.inner.uri()
    }

    fn method(&self) -> String {
        self.inner.method()
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        self.inner.get(name)
    }

    fn query(&self, name: &str) -> Option<ParamValue> {
        self.inner.query(name)
    }

    fn post(&self, name: &str) -> Option<ParamValue> {
        self.inner.post(name)
    }

    fn server(&self, name: &str) -> Option<String> {
        self.inner.server(name)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.inner.cookie(name)
    }

    fn uploaded_files(&self) -> Vec<UploadedFile> {
        self.inner.uploaded_files()
    }

    fn raw_body(&self) -> Bytes {
        self.raw_body.clone()
    }

    // Drops the body: a rebound request belongs to the next dispatch.
    fn rebind(&self, ambient: &AmbientState) -> SharedRequest {
        self.inner.rebind(ambient)
    }
}
