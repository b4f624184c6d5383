//! Reference MVC and micro applications.

use super::{ArticlesClass, MemoryConnection, MEMORY_DB_SERVICE};
use crate::application::{Application, ApplicationKind, Handled, Injectable};
use crate::context::ExecutionContext;
use crate::cookies::{Cookie, Cookies};
use crate::db::SharedConnection;
use crate::di::{Container, ServiceDefinition};
use crate::http::{HttpRequest, Response, SharedRequest, SharedResponse};
use crate::orm::{Criteria, ModelClass};
use crate::router::{Route, RouteMatch, Router, Url};
use crate::session::{SharedSession, StandardSessionManager};
use crate::HarnessResult;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Builds the container shared by both reference applications.
///
/// Services: `router`, `url`, `response`, `cookies`, `session`, `db`,
/// the fixture store under [`MEMORY_DB_SERVICE`], and `datetime`.
#[must_use]
pub fn default_container(connection: Arc<MemoryConnection>, router: Router) -> Arc<Container> {
    let container = Container::new();
    let router = Arc::new(router);

    container.set_instance("router", Arc::clone(&router));
    container.set_instance("url", Arc::new(Url::new(router)));
    container.set_shared(
        "response",
        ServiceDefinition::factory(|_| Ok(Arc::new(SharedResponse::new()))),
    );
    container.set_shared(
        "cookies",
        ServiceDefinition::factory(|_| Ok(Arc::new(Cookies::new()))),
    );
    container.set_shared(
        "session",
        ServiceDefinition::factory(|_| {
            Ok(Arc::new(
                Arc::new(StandardSessionManager::new()) as SharedSession
            ))
        }),
    );
    container.set_instance(
        "db",
        Arc::new(Arc::clone(&connection) as SharedConnection),
    );
    container.set_instance(MEMORY_DB_SERVICE, connection);
    container.set(
        "datetime",
        ServiceDefinition::factory(|_| Ok(Arc::new(Utc::now()))),
        false,
    );

    Arc::new(container)
}

fn request(di: &Container) -> SharedRequest {
    di.get::<SharedRequest>("request")
        .map_or_else(
            |_| Arc::new(HttpRequest::default()) as SharedRequest,
            |r| Arc::clone(r.as_ref()),
        )
}

/// A full-stack application dispatching named routes to actions.
#[derive(Debug)]
pub struct MvcApplication {
    di: Arc<Container>,
}

impl MvcApplication {
    /// Creates the application over a fresh container.
    #[must_use]
    pub fn new(connection: Arc<MemoryConnection>) -> Self {
        let router = Router::new()
            .route(Route::new("/").name("home"))
            .route(Route::new("/datetime").name("datetime"))
            .route(Route::new("/host").name("host"))
            .route(Route::new("/echo").name("echo").via(&["POST", "PUT"]))
            .route(Route::new("/upload").name("upload").via(&["POST"]))
            .route(Route::new("/session/{key}/{value}").name("session"))
            .route(Route::new("/cookie/{name}/{value}").name("cookie"))
            .route(Route::new("/articles").name("articles"))
            .route(Route::new("/articles/{id}").name("article"))
            .route(Route::new("/redirect").name("redirect"))
            .route(
                Route::new("/admin")
                    .name("admin")
                    .hostname("admin.example.com"),
            );
        Self {
            di: default_container(connection, router),
        }
    }

    fn dispatch(&self, matched: &RouteMatch, ctx: &ExecutionContext) -> HarnessResult<Response> {
        let request = request(&self.di);
        let mut response = Response::new();
        let param = |name: &str| matched.params.get(name).cloned().unwrap_or_default();

        match matched.route.route_name().unwrap_or_default() {
            "home" => {
                let name = request.get_str("name").unwrap_or_else(|| "world".to_string());
                response.set_content(format!("Hello, {name}!"));
            }
            "datetime" => {
                let now = self.di.get::<DateTime<Utc>>("datetime")?;
                response.set_content(now.to_rfc3339());
            }
            "host" => {
                let host = ctx.ambient.server_var("HTTP_HOST").unwrap_or_default();
                response.set_content(host.to_string());
            }
            "echo" => {
                response.set_content(request.raw_body());
            }
            "upload" => {
                let names: Vec<String> = request
                    .uploaded_files()
                    .into_iter()
                    .map(|file| format!("{}={}", file.key, file.name))
                    .collect();
                response.set_content(names.join(","));
            }
            "session" => {
                let session = self.di.get::<SharedSession>("session")?;
                session.set(&param("key"), Value::from(param("value")))?;
                response.set_content("stored");
            }
            "cookie" => {
                let cookies = self.di.get::<Cookies>("cookies")?;
                cookies.set(Cookie::new(param("name"), param("value")));
                response.set_content("baked");
            }
            "articles" => {
                let articles = ArticlesClass.find(&self.di, &Criteria::all())?;
                let rows: Vec<Value> = articles.iter().map(|a| a.to_json()).collect();
                response.set_json_content(&Value::Array(rows));
            }
            "article" => {
                let mut attributes = serde_json::Map::new();
                attributes.insert("id".to_string(), Value::from(param("id")));
                let criteria = Criteria::from_attributes(&attributes);
                match ArticlesClass.find_first(&self.di, &criteria)? {
                    Some(article) => {
                        response.set_json_content(&article.to_json());
                    }
                    None => {
                        response.set_status_code(404, None);
                    }
                }
            }
            "redirect" => {
                response.redirect("/");
            }
            _ => {
                response.set_status_code(404, None);
            }
        }
        Ok(response)
    }
}

impl Injectable for MvcApplication {
    fn di(&self) -> Option<Arc<Container>> {
        Some(Arc::clone(&self.di))
    }

    fn as_application(&self) -> Option<&dyn Application> {
        Some(self)
    }
}

impl Application for MvcApplication {
    fn kind(&self) -> ApplicationKind {
        ApplicationKind::Mvc
    }

    fn handle(&self, path: &str, ctx: &ExecutionContext) -> HarnessResult<Handled> {
        let router = self.di.get::<Router>("router")?;
        let method = request(&self.di).method();

        let Some(matched) = router.handle_method(&method, path) else {
            let mut response = Response::new();
            response.set_status_code(404, None);
            response.set_content("Not Found");
            return Ok(Handled::Response(response));
        };
        tracing::debug!(route = ?matched.route.route_name(), path, "dispatching");
        self.dispatch(&matched, ctx).map(Handled::Response)
    }
}

/// A micro application whose handlers return plain values or write to the
/// `response` service.
#[derive(Debug)]
pub struct MicroApplication {
    di: Arc<Container>,
}

impl MicroApplication {
    /// Creates the application over a fresh container.
    #[must_use]
    pub fn new(connection: Arc<MemoryConnection>) -> Self {
        let router = Router::new()
            .route(Route::new("/").name("index"))
            .route(Route::new("/hello/{name}").name("hello"))
            .route(Route::new("/status").name("status"))
            .route(Route::new("/silent").name("silent"));
        Self {
            di: default_container(connection, router),
        }
    }
}

impl Injectable for MicroApplication {
    fn di(&self) -> Option<Arc<Container>> {
        Some(Arc::clone(&self.di))
    }

    fn as_application(&self) -> Option<&dyn Application> {
        Some(self)
    }
}

impl Application for MicroApplication {
    fn kind(&self) -> ApplicationKind {
        ApplicationKind::Micro
    }

    fn handle(&self, path: &str, _ctx: &ExecutionContext) -> HarnessResult<Handled> {
        let router = self.di.get::<Router>("router")?;
        let response = self.di.get::<SharedResponse>("response")?;

        let Some(matched) = router.handle(path) else {
            response.with(|r| {
                r.set_status_code(404, None);
                r.set_content("Not Found");
            });
            return Ok(Handled::Nothing);
        };

        let value = match matched.route.route_name().unwrap_or_default() {
            "index" => Value::from("micro index"),
            "hello" => Value::from(format!(
                "Hello, {}",
                matched.params.get("name").cloned().unwrap_or_default()
            )),
            "status" => {
                response.with(|r| {
                    r.set_status_code(201, None);
                    r.set_json_content(&json!({"created": true}));
                });
                return Ok(Handled::Nothing);
            }
            _ => return Ok(Handled::Nothing),
        };

        // String results become the response content.
        if let Some(text) = value.as_str() {
            response.with(|r| {
                r.set_content(text.to_string());
            });
        }
        Ok(Handled::Value(value))
    }
}

/// An object with a container that cannot handle requests.
#[derive(Debug, Default)]
pub struct ServicesOnly {
    di: Arc<Container>,
}

impl Injectable for ServicesOnly {
    fn di(&self) -> Option<Arc<Container>> {
        Some(Arc::clone(&self.di))
    }
}

/// An object without a container.
#[derive(Debug, Default)]
pub struct Detached;

impl Injectable for Detached {
    fn di(&self) -> Option<Arc<Container>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(response: &Response) -> String {
        response
            .content()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_mvc_home() {
        let app = MvcApplication::new(Arc::new(MemoryConnection::new()));
        let Handled::Response(response) = app.handle("/", &ExecutionContext::new()).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(content(&response), "Hello, world!");
        assert_eq!(response.status_code(), None);
    }

    #[test]
    fn test_mvc_not_found() {
        let app = MvcApplication::new(Arc::new(MemoryConnection::new()));
        let Handled::Response(response) = app.handle("/nope", &ExecutionContext::new()).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.status_code(), Some(404));
    }

    #[test]
    fn test_mvc_host_reads_ambient_state() {
        let app = MvcApplication::new(Arc::new(MemoryConnection::new()));
        let mut ctx = ExecutionContext::new();
        ctx.ambient.server.insert("HTTP_HOST".into(), "example.org".into());
        let Handled::Response(response) = app.handle("/host", &ctx).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(content(&response), "example.org");
    }

    #[test]
    fn test_micro_string_result_goes_to_response_service() {
        let app = MicroApplication::new(Arc::new(MemoryConnection::new()));
        let handled = app.handle("/hello/ann", &ExecutionContext::new()).unwrap();
        assert_eq!(handled, Handled::Value(Value::from("Hello, ann")));

        let response = app.di.get::<SharedResponse>("response").unwrap().snapshot();
        assert_eq!(content(&response), "Hello, ann");
    }

    #[test]
    fn test_micro_not_found() {
        let app = MicroApplication::new(Arc::new(MemoryConnection::new()));
        assert_eq!(
            app.handle("/missing", &ExecutionContext::new()).unwrap(),
            Handled::Nothing
        );
        let response = app.di.get::<SharedResponse>("response").unwrap().snapshot();
        assert_eq!(response.status_code(), Some(404));
    }

    #[test]
    fn test_container_services() {
        let di = default_container(Arc::new(MemoryConnection::new()), Router::new());
        for name in ["router", "url", "response", "cookies", "session", "db", MEMORY_DB_SERVICE, "datetime"] {
            assert!(di.has(name), "missing {name}");
        }
        assert!(di.get::<SharedConnection>("db").is_ok());
        assert!(di.get::<SharedSession>("session").is_ok());
    }

    #[test]
    fn test_non_applications() {
        assert!(ServicesOnly::default().as_application().is_none());
        assert!(ServicesOnly::default().di().is_some());
        assert!(Detached.di().is_none());
    }
}
