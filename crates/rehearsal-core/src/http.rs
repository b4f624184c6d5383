//! Framework request and response objects.
//!
//! [`FrameworkRequest`] is what application code reads: the URI, method,
//! parameters, server variables and uploads of the request being handled.
//! The reference implementation, [`HttpRequest`], reads a snapshot of the
//! [`AmbientState`]. [`Response`] carries an enumerable [`Headers`]
//! collection and optional content; [`SharedResponse`] is the mutable
//! `response` service that handlers write into when they do not return a
//! response value.

use crate::context::AmbientState;
use crate::params::{ParamMap, ParamValue};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A request as stored in the container's `request` service.
pub type SharedRequest = Arc<dyn FrameworkRequest>;

/// The request as seen by application code.
pub trait FrameworkRequest: Send + Sync {
    /// Returns the request URI (path and query).
    fn uri(&self) -> String;

    /// Returns the upper-cased request method.
    fn method(&self) -> String;

    /// Looks up a combined request parameter.
    fn get(&self, name: &str) -> Option<ParamValue>;

    /// Looks up a query parameter.
    fn query(&self, name: &str) -> Option<ParamValue>;

    /// Looks up a body parameter.
    fn post(&self, name: &str) -> Option<ParamValue>;

    /// Looks up a server variable.
    fn server(&self, name: &str) -> Option<String>;

    /// Looks up an incoming cookie.
    fn cookie(&self, name: &str) -> Option<String>;

    /// Returns the uploaded files, nested fields flattened to `field.key` names.
    fn uploaded_files(&self) -> Vec<UploadedFile>;

    /// Returns the raw request body.
    fn raw_body(&self) -> Bytes;

    /// Builds a request of the same kind that reads `ambient`.
    fn rebind(&self, ambient: &AmbientState) -> Arc<dyn FrameworkRequest>;

    /// Returns `true` if any file was uploaded.
    fn has_files(&self) -> bool {
        !self.uploaded_files().is_empty()
    }

    /// Looks up a scalar combined request parameter.
    fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| v.as_str().map(str::to_string))
    }
}

/// A file uploaded with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Field key, nested keys joined with `.`.
    pub key: String,
    /// Client-side file name.
    pub name: String,
    /// Temporary path of the uploaded content.
    pub temp_name: String,
    /// Upload error code (0 means no error).
    pub error: u32,
    /// Size in bytes.
    pub size: u64,
    /// Client-declared MIME type.
    pub mime_type: String,
}

impl UploadedFile {
    /// Returns the extension of the client-side name, without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or("", |(_, extension)| extension)
    }

    /// Returns `true` if the upload completed without error.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.error == 0
    }
}

/// The reference request implementation, backed by an ambient snapshot.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    ambient: AmbientState,
}

impl HttpRequest {
    /// Creates a request reading `ambient`.
    #[must_use]
    pub fn from_ambient(ambient: AmbientState) -> Self {
        Self { ambient }
    }

    /// Returns the ambient snapshot this request reads.
    #[must_use]
    pub fn ambient(&self) -> &AmbientState {
        &self.ambient
    }
}

impl FrameworkRequest for HttpRequest {
    fn uri(&self) -> String {
        self.ambient
            .server_var("REQUEST_URI")
            .unwrap_or_default()
            .to_string()
    }

    fn method(&self) -> String {
        self.ambient
            .server_var("REQUEST_METHOD")
            .map_or_else(|| "GET".to_string(), str::to_uppercase)
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        self.ambient.request.get(name).cloned()
    }

    fn query(&self, name: &str) -> Option<ParamValue> {
        self.ambient.get.get(name).cloned()
    }

    fn post(&self, name: &str) -> Option<ParamValue> {
        self.ambient.post.get(name).cloned()
    }

    fn server(&self, name: &str) -> Option<String> {
        self.ambient.server.get(name).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.ambient.cookies.get(name).cloned()
    }

    fn uploaded_files(&self) -> Vec<UploadedFile> {
        let mut files = Vec::new();
        for (field, attributes) in &self.ambient.files {
            collect_files(field, attributes, &[], &mut files);
        }
        files
    }

    fn raw_body(&self) -> Bytes {
        Bytes::new()
    }

    fn rebind(&self, ambient: &AmbientState) -> Arc<dyn FrameworkRequest> {
        Arc::new(Self::from_ambient(ambient.clone()))
    }
}

fn attribute_at<'a>(attributes: &'a ParamMap, attribute: &str, path: &[String]) -> Option<&'a ParamValue> {
    let mut value = attributes.get(attribute)?;
    for key in path {
        value = value.get(key)?;
    }
    Some(value)
}

fn scalar_at(attributes: &ParamMap, attribute: &str, path: &[String]) -> String {
    attribute_at(attributes, attribute, path)
        .and_then(ParamValue::as_str)
        .unwrap_or_default()
        .to_string()
}

fn collect_files(field: &str, attributes: &ParamMap, path: &[String], out: &mut Vec<UploadedFile>) {
    match attribute_at(attributes, "name", path) {
        Some(ParamValue::Scalar(name)) => {
            let key = std::iter::once(field)
                .chain(path.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(".");
            out.push(UploadedFile {
                key,
                name: name.clone(),
                temp_name: scalar_at(attributes, "tmp_name", path),
                error: scalar_at(attributes, "error", path).parse().unwrap_or(0),
                size: scalar_at(attributes, "size", path).parse().unwrap_or(0),
                mime_type: scalar_at(attributes, "type", path),
            });
        }
        Some(ParamValue::Array(nested)) => {
            for key in nested.keys() {
                let mut inner = path.to_vec();
                inner.push(key.clone());
                collect_files(field, attributes, &inner, out);
            }
        }
        None => {}
    }
}

/// An ordered, enumerable response header collection.
///
/// Names keep the case they were set with; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: IndexMap<String, String>,
}

impl Headers {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(existing) = self.find_key(&name) {
            self.entries.shift_remove(&existing);
        }
        self.entries.insert(name, value.into());
    }

    /// Returns a header value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find_key(name)
            .and_then(|key| self.entries.get(&key))
            .map(String::as_str)
    }

    /// Removes a header.
    pub fn remove(&mut self, name: &str) {
        if let Some(key) = self.find_key(name) {
            self.entries.shift_remove(&key);
        }
    }

    /// Returns `true` if the header is set.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.find_key(name).is_some()
    }

    /// Iterates over the headers in the order they were set.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every header.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    fn find_key(&self, name: &str) -> Option<String> {
        self.entries
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }
}

/// A framework response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    headers: Headers,
    content: Option<Bytes>,
}

impl Response {
    /// Creates an empty response with no status header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a response with content.
    #[must_use]
    pub fn with_content(content: impl Into<Bytes>) -> Self {
        let mut response = Self::new();
        response.set_content(content);
        response
    }

    /// Sets the `Status` header, e.g. `404 Not Found`.
    pub fn set_status_code(&mut self, code: u16, message: Option<&str>) -> &mut Self {
        let reason = message
            .map(str::to_string)
            .or_else(|| {
                http::StatusCode::from_u16(code)
                    .ok()
                    .and_then(|s| s.canonical_reason().map(str::to_string))
            })
            .unwrap_or_default();
        let value = if reason.is_empty() {
            code.to_string()
        } else {
            format!("{code} {reason}")
        };
        self.headers.set("Status", value);
        self
    }

    /// Returns the status code from the `Status` header.
    ///
    /// The leading integer of the header is used; a missing or unparsable
    /// header yields `None`.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        let raw = self.headers.get("Status")?;
        let digits: String = raw.trim().chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    }

    /// Sets a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Sets the `Content-Type` header.
    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.set_header("Content-Type", content_type)
    }

    /// Sets the response content.
    pub fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        self.content = Some(content.into());
        self
    }

    /// Sets JSON content and the matching content type.
    pub fn set_json_content(&mut self, value: &serde_json::Value) -> &mut Self {
        self.set_content_type("application/json; charset=UTF-8");
        self.set_content(value.to_string())
    }

    /// Redirects to `location` with a 302 status.
    pub fn redirect(&mut self, location: &str) -> &mut Self {
        self.set_status_code(302, None);
        self.set_header("Location", location)
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the headers mutably.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the content, if any was set.
    #[must_use]
    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}

/// The container's `response` service.
#[derive(Debug, Default)]
pub struct SharedResponse {
    inner: Mutex<Response>,
}

impl SharedResponse {
    /// Creates an empty shared response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the response.
    pub fn with<R>(&self, f: impl FnOnce(&mut Response) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Returns a copy of the current response.
    #[must_use]
    pub fn snapshot(&self) -> Response {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambient_with_file() -> AmbientState {
        let mut ambient = AmbientState::new();
        let mut attrs = ParamMap::new();
        attrs.insert("name".into(), "SomeFile.ext".into());
        attrs.insert("tmp_name".into(), "/tmp/php123".into());
        attrs.insert("error".into(), "0".into());
        attrs.insert("size".into(), "12".into());
        ambient.files.insert("file".into(), attrs);
        ambient
    }

    #[test]
    fn test_request_defaults() {
        let request = HttpRequest::default();
        assert_eq!(request.uri(), "");
        assert_eq!(request.method(), "GET");
        assert!(!request.has_files());
        assert!(request.raw_body().is_empty());
    }

    #[test]
    fn test_request_reads_ambient() {
        let mut ambient = AmbientState::new();
        ambient.server.insert("REQUEST_METHOD".into(), "post".into());
        ambient.server.insert("REQUEST_URI".into(), "/a?b=1".into());
        ambient.request.insert("b".into(), "1".into());
        ambient.get.insert("b".into(), "1".into());
        ambient.cookies.insert("token".into(), "t".into());

        let request = HttpRequest::from_ambient(ambient);
        assert_eq!(request.method(), "POST");
        assert_eq!(request.uri(), "/a?b=1");
        assert_eq!(request.get_str("b").as_deref(), Some("1"));
        assert_eq!(request.query("b"), Some(ParamValue::from("1")));
        assert_eq!(request.post("b"), None);
        assert_eq!(request.cookie("token").as_deref(), Some("t"));
    }

    #[test]
    fn test_single_uploaded_file() {
        let request = HttpRequest::from_ambient(ambient_with_file());
        assert!(request.has_files());
        let files = request.uploaded_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].key, "file");
        assert_eq!(files[0].name, "SomeFile.ext");
        assert_eq!(files[0].temp_name, "/tmp/php123");
        assert_eq!(files[0].extension(), "ext");
        assert_eq!(files[0].size, 12);
        assert!(files[0].is_successful());
    }

    #[test]
    fn test_nested_uploaded_files() {
        let mut ambient = AmbientState::new();
        let mut attrs = ParamMap::new();
        attrs.insert("name".into(), vec!["a.txt", "b.png"].into());
        attrs.insert("tmp_name".into(), vec!["/tmp/a", "/tmp/b"].into());
        attrs.insert("error".into(), vec!["0", "4"].into());
        ambient.files.insert("docs".into(), attrs);

        let files = HttpRequest::from_ambient(ambient).uploaded_files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].key, "docs.1");
        assert_eq!(files[1].temp_name, "/tmp/b");
        assert_eq!(files[1].extension(), "png");
        assert!(!files[1].is_successful());
    }

    #[test]
    fn test_rebind_reads_new_ambient() {
        let request = HttpRequest::default();
        let rebound = request.rebind(&ambient_with_file());
        assert!(rebound.has_files());
    }

    #[test]
    fn test_extension_without_dot() {
        let file = UploadedFile {
            key: "f".into(),
            name: "README".into(),
            temp_name: String::new(),
            error: 0,
            size: 0,
            mime_type: String::new(),
        };
        assert_eq!(file.extension(), "");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/html");
        headers.set("content-type", "text/plain");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));

        headers.remove("Content-type");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_status_code_parsing() {
        let mut response = Response::new();
        assert_eq!(response.status_code(), None);

        response.set_status_code(404, None);
        assert_eq!(response.headers().get("Status"), Some("404 Not Found"));
        assert_eq!(response.status_code(), Some(404));

        response.set_header("Status", "garbage");
        assert_eq!(response.status_code(), None);
    }

    #[test]
    fn test_redirect() {
        let mut response = Response::new();
        response.redirect("/login");
        assert_eq!(response.status_code(), Some(302));
        assert_eq!(response.headers().get("Location"), Some("/login"));
    }

    #[test]
    fn test_shared_response() {
        let shared = SharedResponse::new();
        shared.with(|r| {
            r.set_content("hello");
        });
        assert_eq!(shared.snapshot().content().unwrap().as_ref(), b"hello");
    }
}
