//! Test request building.

use crate::error::ConnectorError;
use bytes::Bytes;
use http::{HeaderName, Method, Uri};
use indexmap::IndexMap;
use rehearsal_core::params::{ParamMap, ParamValue};
use serde::Serialize;

/// A file attached to a test request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFile {
    /// Form field name, bracket notation allowed (`docs[]`, `user[avatar]`).
    pub field_name: String,
    /// Client-side file name.
    pub original_name: String,
    /// Where the file content lives.
    pub temp_path: String,
    /// Upload error code, 0 for success.
    pub error: u32,
    /// Size in bytes.
    pub size: u64,
    /// Declared MIME type.
    pub mime_type: String,
}

impl TestFile {
    /// Creates a successful upload with unknown size and type.
    pub fn new(
        field_name: impl Into<String>,
        original_name: impl Into<String>,
        temp_path: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            original_name: original_name.into(),
            temp_path: temp_path.into(),
            error: 0,
            size: 0,
            mime_type: String::new(),
        }
    }

    /// Sets the size.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Sets the upload error code.
    #[must_use]
    pub fn error(mut self, error: u32) -> Self {
        self.error = error;
        self
    }
}

/// A simulated request handed to the [`Connector`](crate::Connector).
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    uri: Option<Uri>,
    parameters: ParamMap,
    files: Vec<TestFile>,
    cookies: IndexMap<String, String>,
    server: IndexMap<String, String>,
    content: Bytes,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates a new HEAD request.
    pub fn head(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::HEAD, uri)
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URI, or `None` when the request targets the current page.
    #[must_use]
    pub fn uri(&self) -> Option<&Uri> {
        self.uri.as_ref()
    }

    /// Returns the flat parameter bag.
    #[must_use]
    pub fn parameters(&self) -> &ParamMap {
        &self.parameters
    }

    /// Returns the attached files.
    #[must_use]
    pub fn files(&self) -> &[TestFile] {
        &self.files
    }

    /// Returns the cookies sent with the request.
    #[must_use]
    pub fn cookies(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    /// Returns the request-specific server variables.
    #[must_use]
    pub fn server(&self) -> &IndexMap<String, String> {
        &self.server
    }

    /// Returns the raw body.
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

/// Builder for constructing test requests.
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    parameters: ParamMap,
    files: Vec<TestFile>,
    cookies: IndexMap<String, String>,
    server: IndexMap<String, String>,
    content: Option<Bytes>,
    error: Option<ConnectorError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            parameters: ParamMap::new(),
            files: Vec::new(),
            cookies: IndexMap::new(),
            server: IndexMap::new(),
            content: None,
            error: None,
        }
    }

    /// Adds a request parameter.
    ///
    /// Bracket-notation names (`user[name]`, `tags[]`) are expanded when the
    /// request is dispatched.
    ///
    /// # Example
    ///
    /// ```
    /// use rehearsal_connector::TestRequest;
    ///
    /// let request = TestRequest::get("/")
    ///     .param("first", "one")
    ///     .param("second", "two")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.parameters().len(), 2);
    /// ```
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Adds every parameter in `params`.
    pub fn params(mut self, params: ParamMap) -> Self {
        self.parameters.extend(params);
        self
    }

    /// Attaches a file.
    pub fn file(mut self, file: TestFile) -> Self {
        self.files.push(file);
        self
    }

    /// Sends a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Sets a server variable for this request only.
    pub fn server(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server.insert(name.into(), value.into());
        self
    }

    /// Sets a request header.
    ///
    /// Headers travel as `HTTP_*` server variables; `X-Request-Id` becomes
    /// `HTTP_X_REQUEST_ID`.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = name.as_ref();
        match HeaderName::try_from(name) {
            Ok(parsed) => {
                let var = format!("HTTP_{}", parsed.as_str().to_uppercase().replace('-', "_"));
                self.server.insert(var, value.into());
            }
            Err(e) => {
                self.error
                    .get_or_insert(ConnectorError::InvalidHeader(format!("{name}: {e}")));
            }
        }
        self
    }

    /// Sets the Content-Type.
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.server("CONTENT_TYPE", content_type)
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.content = Some(body.into());
        self
    }

    /// Sets the request body as JSON.
    ///
    /// This also sets the Content-Type to `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.content = Some(Bytes::from(bytes)),
            Err(e) => {
                self.error.get_or_insert(ConnectorError::Json(e));
            }
        }
        self.content_type("application/json")
    }

    /// Builds the test request.
    ///
    /// An empty URI is kept as "no URI"; the connector then reuses the
    /// current request's URI.
    pub fn build(self) -> Result<TestRequest, ConnectorError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri = if self.uri.is_empty() {
            None
        } else {
            Some(
                self.uri
                    .parse::<Uri>()
                    .map_err(|e| ConnectorError::InvalidUri {
                        uri: self.uri.clone(),
                        reason: e.to_string(),
                    })?,
            )
        };

        Ok(TestRequest {
            method: self.method,
            uri,
            parameters: self.parameters,
            files: self.files,
            cookies: self.cookies,
            server: self.server,
            content: self.content.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_request() {
        let request = TestRequest::get("/users").build().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().unwrap().path(), "/users");
        assert!(request.content().is_empty());
    }

    #[test]
    fn test_methods() {
        assert_eq!(TestRequest::post("/").build().unwrap().method(), Method::POST);
        assert_eq!(TestRequest::put("/").build().unwrap().method(), Method::PUT);
        assert_eq!(TestRequest::patch("/").build().unwrap().method(), Method::PATCH);
        assert_eq!(TestRequest::delete("/").build().unwrap().method(), Method::DELETE);
        assert_eq!(TestRequest::head("/").build().unwrap().method(), Method::HEAD);
    }

    #[test]
    fn test_empty_uri_is_none() {
        let request = TestRequest::get("").build().unwrap();
        assert!(request.uri().is_none());
    }

    #[test]
    fn test_invalid_uri() {
        let err = TestRequest::get("/a b").build().unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidUri { .. }));
    }

    #[test]
    fn test_header_becomes_server_variable() {
        let request = TestRequest::get("/")
            .header("X-Request-Id", "12345")
            .build()
            .unwrap();
        assert_eq!(
            request.server().get("HTTP_X_REQUEST_ID").map(String::as_str),
            Some("12345")
        );
    }

    #[test]
    fn test_invalid_header_fails_build() {
        let err = TestRequest::get("/")
            .header("bad header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidHeader(_)));
    }

    #[test]
    fn test_json_body() {
        let request = TestRequest::post("/echo")
            .json(&json!({"name": "Alice"}))
            .build()
            .unwrap();
        assert_eq!(request.content().as_ref(), br#"{"name":"Alice"}"#);
        assert_eq!(
            request.server().get("CONTENT_TYPE").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_params_files_cookies() {
        let request = TestRequest::post("/upload")
            .param("tags[]", "a")
            .file(TestFile::new("doc", "SomeFile.ext", "/tmp/php1").size(12))
            .cookie("theme", "dark")
            .build()
            .unwrap();
        assert_eq!(request.parameters().get("tags[]"), Some(&ParamValue::from("a")));
        assert_eq!(request.files()[0].size, 12);
        assert_eq!(request.cookies().get("theme").map(String::as_str), Some("dark"));
    }
}
