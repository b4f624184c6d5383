//! Translation of a [`TestRequest`] into ambient request state.

use crate::request::{TestFile, TestRequest};
use http::Method;
use indexmap::IndexMap;
use rehearsal_core::params::{self, ParamMap, ParamValue};
use rehearsal_core::{AmbientState, FileMap};

/// Upload attributes in the order frameworks list them.
const FILE_ATTRIBUTES: [&str; 5] = ["name", "type", "tmp_name", "error", "size"];

/// Remaps attached files into field-then-attribute shape.
///
/// `user[avatar]` becomes `files["user"]["name"]["avatar"]`, and so on for
/// every attribute; `docs[]` appends.
#[must_use]
pub fn remap_files(files: &[TestFile]) -> FileMap {
    let mut remapped = FileMap::new();
    for file in files {
        let segments = params::split_key(&file.field_name);
        let Some((field, path)) = segments.split_first() else {
            continue;
        };
        let attributes = remapped.entry(field.clone()).or_default();
        for attribute in FILE_ATTRIBUTES {
            let value = ParamValue::Scalar(file_attribute(file, attribute));
            let mut at = Vec::with_capacity(path.len() + 1);
            at.push(attribute.to_string());
            at.extend(path.iter().cloned());
            params::insert_path(attributes, &at, value);
        }
    }
    remapped
}

fn file_attribute(file: &TestFile, attribute: &str) -> String {
    match attribute {
        "name" => file.original_name.clone(),
        "type" => file.mime_type.clone(),
        "tmp_name" => file.temp_path.clone(),
        "error" => file.error.to_string(),
        _ => file.size.to_string(),
    }
}

/// The split of a request target into path and literal query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Path component, `/` when empty.
    pub path: String,
    /// Literal query string, if any.
    pub query: Option<String>,
}

impl Target {
    /// Splits a `path?query` string.
    #[must_use]
    pub fn parse(uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        Self {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
        }
    }

    /// Returns the path with the query re-attached.
    #[must_use]
    pub fn request_uri(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

/// Builds the ambient state a framework sees for `request`.
///
/// `defaults` are the connector-wide server variables; the request's own
/// server variables override them.
#[must_use]
pub fn populate(
    request: &TestRequest,
    target: &Target,
    defaults: &IndexMap<String, String>,
) -> AmbientState {
    let mut server = defaults.clone();
    server.extend(request.server().iter().map(|(k, v)| (k.clone(), v.clone())));
    server.insert(
        "REQUEST_METHOD".to_string(),
        request.method().as_str().to_uppercase(),
    );
    server.insert("REQUEST_URI".to_string(), target.request_uri());

    let parameters = params::remap(request.parameters());
    let (mut get, post) = if request.method() == Method::GET {
        (parameters.clone(), ParamMap::new())
    } else {
        (ParamMap::new(), parameters.clone())
    };

    if let Some(query) = &target.query {
        get.extend(params::parse_query(query));
    }
    get.insert("_url".to_string(), ParamValue::Scalar(target.path.clone()));

    let query_string = params::build_query(&get);
    server.insert("QUERY_STRING".to_string(), query_string.clone());

    AmbientState {
        server,
        get,
        post,
        request: parameters,
        cookies: request.cookies().clone(),
        files: remap_files(request.files()),
        session: serde_json::Map::new(),
        query_string,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> IndexMap<String, String> {
        IndexMap::from([("HTTP_HOST".to_string(), "localhost".to_string())])
    }

    #[test]
    fn test_single_file() {
        let files = remap_files(&[TestFile::new("doc", "SomeFile.ext", "/tmp/a").size(3)]);
        let doc = &files["doc"];
        assert_eq!(doc["name"], ParamValue::from("SomeFile.ext"));
        assert_eq!(doc["tmp_name"], ParamValue::from("/tmp/a"));
        assert_eq!(doc["error"], ParamValue::from("0"));
        assert_eq!(doc["size"], ParamValue::from("3"));
        assert_eq!(doc["type"], ParamValue::from(""));
    }

    #[test]
    fn test_nested_and_appended_files() {
        let files = remap_files(&[
            TestFile::new("user[avatar]", "me.png", "/tmp/1"),
            TestFile::new("docs[]", "a.txt", "/tmp/2"),
            TestFile::new("docs[]", "b.txt", "/tmp/3"),
        ]);
        assert_eq!(
            files["user"]["name"].get("avatar"),
            Some(&ParamValue::from("me.png"))
        );
        assert_eq!(files["docs"]["name"].get("1"), Some(&ParamValue::from("b.txt")));
        assert_eq!(files["docs"]["tmp_name"].get("1"), Some(&ParamValue::from("/tmp/3")));
    }

    #[test]
    fn test_target_parse() {
        let target = Target::parse("/a/b?x=1");
        assert_eq!(target.path, "/a/b");
        assert_eq!(target.query.as_deref(), Some("x=1"));
        assert_eq!(target.request_uri(), "/a/b?x=1");
        assert_eq!(Target::parse("").path, "/");
    }

    #[test]
    fn test_get_parameters_land_in_get() {
        let request = TestRequest::get("/")
            .param("first", "one")
            .build()
            .unwrap();
        let ambient = populate(&request, &Target::parse("/"), &defaults());
        assert_eq!(ambient.get["first"], ParamValue::from("one"));
        assert_eq!(ambient.get["_url"], ParamValue::from("/"));
        assert!(ambient.post.is_empty());
        assert_eq!(ambient.request["first"], ParamValue::from("one"));
        assert_eq!(ambient.server_var("REQUEST_METHOD"), Some("GET"));
        assert_eq!(ambient.server_var("HTTP_HOST"), Some("localhost"));
        assert_eq!(ambient.query_string, "first=one&_url=%2F");
    }

    #[test]
    fn test_post_parameters_land_in_post() {
        let request = TestRequest::post("/form?page=2")
            .param("user[name]", "alice")
            .server("HTTP_HOST", "example.org")
            .build()
            .unwrap();
        let ambient = populate(&request, &Target::parse("/form?page=2"), &defaults());
        let user = ambient.post["user"].as_array().unwrap();
        assert_eq!(user["name"], ParamValue::from("alice"));
        assert_eq!(ambient.get["page"], ParamValue::from("2"));
        assert!(!ambient.get.contains_key("user"));
        assert_eq!(ambient.server_var("REQUEST_URI"), Some("/form?page=2"));
        assert_eq!(ambient.server_var("HTTP_HOST"), Some("example.org"));
        assert_eq!(
            ambient.server_var("QUERY_STRING"),
            Some(ambient.query_string.as_str())
        );
    }

    #[test]
    fn test_method_is_uppercased() {
        let method = Method::from_bytes(b"purge").unwrap();
        let request = crate::request::TestRequestBuilder::new(method, "/").build().unwrap();
        let ambient = populate(&request, &Target::parse("/"), &defaults());
        assert_eq!(ambient.server_var("REQUEST_METHOD"), Some("PURGE"));
    }
}
