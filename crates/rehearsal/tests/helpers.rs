//! Session, record, container and navigation helpers.

use rehearsal::prelude::*;
use rehearsal_core::fixtures::{self, MemoryConnection};
use serde_json::{json, Map, Value};
use std::sync::Arc;

struct Harness {
    module: Module,
    ctx: ExecutionContext,
}

impl Harness {
    fn start() -> Self {
        let db = Arc::new(MemoryConnection::new());
        let mut module = Module::new(ModuleConfig::default())
            .with_bootstrap_loader(Arc::new(fixtures::bootstrap_registry(db)))
            .with_models(fixtures::model_registry());
        let mut ctx = ExecutionContext::new();
        module.before("helpers", &mut ctx).unwrap();
        Self { module, ctx }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if self.module.is_active() {
            let _ = self.module.after("helpers", &mut self.ctx);
        }
    }
}

fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn helpers_need_a_running_test() {
    let module = Module::new(ModuleConfig::default());
    let err = module.have_in_session("user", "ada").unwrap_err();
    assert!(matches!(err, HarnessError::Lifecycle { .. }));
}

#[test]
fn session_values_written_by_the_test() {
    let h = Harness::start();
    h.module.have_in_session("user", "ada").unwrap();
    h.module.have_in_session("cart", json!([1, 2])).unwrap();

    h.module.see_in_session("user", None).unwrap();
    h.module.see_in_session("user", Some(json!("ada"))).unwrap();
    h.module
        .see_session_has_values([("user", None), ("cart", Some(json!([1, 2])))])
        .unwrap();
}

#[test]
fn session_values_written_by_the_application() {
    let mut h = Harness::start();
    h.module
        .am_on_page("/session/flash/saved", &mut h.ctx)
        .unwrap()
        .assert_body_eq("stored");
    h.module.see_in_session("flash", Some(json!("saved"))).unwrap();
}

#[test]
#[should_panic(expected = "No session variable with key 'missing'")]
fn missing_session_key_fails() {
    let h = Harness::start();
    h.module.see_in_session("missing", None).unwrap();
}

#[test]
#[should_panic(expected = "Session variable 'user' is \"ada\", expected \"bob\"")]
fn mismatched_session_value_fails() {
    let h = Harness::start();
    h.module.have_in_session("user", "ada").unwrap();
    h.module.see_in_session("user", Some(json!("bob"))).unwrap();
}

#[test]
fn have_record_returns_the_identity() {
    let h = Harness::start();
    let id = h
        .module
        .have_record("Articles", &attrs(json!({ "title": "First" })))
        .unwrap();
    assert_eq!(id, Some(json!(1)));

    h.module
        .see_record("Articles", &attrs(json!({ "title": "First" })))
        .unwrap();
    h.module
        .see_record("Articles", &attrs(json!({ "id": "1", "body": null })))
        .unwrap();
    h.module
        .dont_see_record("Articles", &attrs(json!({ "title": "Second" })))
        .unwrap();

    let record = h
        .module
        .grab_record("Articles", &attrs(json!({ "id": 1 })))
        .unwrap()
        .unwrap();
    assert_eq!(record.attribute("title"), Some(json!("First")));
}

#[test]
#[should_panic(expected = "Record Articles was not saved. Messages: \n[PresenceOf] title: title is required")]
fn invalid_record_fails_with_messages() {
    let h = Harness::start();
    h.module
        .have_record("Articles", &attrs(json!({ "title": " " })))
        .unwrap();
}

#[test]
#[should_panic(expected = "Couldn't find Articles with {\"title\":\"Ghost\"}")]
fn missing_record_fails() {
    let h = Harness::start();
    h.module
        .see_record("Articles", &attrs(json!({ "title": "Ghost" })))
        .unwrap();
}

#[test]
#[should_panic(expected = "Unexpectedly managed to find Articles")]
fn unexpected_record_fails() {
    let h = Harness::start();
    h.module
        .have_record("Articles", &attrs(json!({ "title": "Here" })))
        .unwrap();
    h.module
        .dont_see_record("Articles", &attrs(json!({ "title": "Here" })))
        .unwrap();
}

#[test]
#[should_panic(expected = "Couldn't find 3 records of Articles with {}. Found: 2 records.")]
fn wrong_record_count_fails() {
    let h = Harness::start();
    for title in ["One", "Two"] {
        h.module
            .have_record("Articles", &attrs(json!({ "title": title })))
            .unwrap();
    }
    h.module
        .see_number_of_records("Articles", 3, &Map::new())
        .unwrap();
}

#[test]
fn unknown_model_is_an_error() {
    let h = Harness::start();
    let err = h.module.see_record("Comments", &Map::new()).unwrap_err();
    assert!(matches!(err, HarnessError::ModelNotFound { .. }));
}

#[test]
fn services_can_be_added_and_grabbed() {
    let h = Harness::start();
    let instance = h
        .module
        .add_service_to_container(
            "greeting",
            ServiceDefinition::instance(String::from("hello")),
            true,
        )
        .unwrap();
    assert_eq!(
        instance.downcast::<String>().unwrap().as_str(),
        "hello"
    );

    let grabbed = h
        .module
        .grab_service_from_container::<String>("greeting")
        .unwrap();
    assert_eq!(grabbed.as_str(), "hello");
}

#[test]
#[should_panic(expected = "Service mailer is not available in container")]
fn missing_service_fails() {
    let h = Harness::start();
    let _ = h.module.grab_service_from_container::<String>("mailer");
}

#[test]
fn routes_and_current_url() {
    let mut h = Harness::start();
    h.module
        .have_record("Articles", &attrs(json!({ "title": "Routed" })))
        .unwrap();

    h.module
        .am_on_route("article", &[("id", "1")], &mut h.ctx)
        .unwrap()
        .assert_status_code(200)
        .assert_body_contains("Routed");
    h.module.see_current_url_equals("/articles/1");

    h.module.am_on_page("/", &mut h.ctx).unwrap();
    h.module.see_current_route_is("home").unwrap();
}

#[test]
#[should_panic(expected = "Current URL is '/articles', expected '/'")]
fn wrong_current_url_fails() {
    let mut h = Harness::start();
    h.module.am_on_page("/articles", &mut h.ctx).unwrap();
    h.module.see_current_route_is("home").unwrap();
}

#[test]
fn internal_domains_cover_host_and_route_hostnames() {
    let mut h = Harness::start();
    h.module
        .connector_mut()
        .set_server_parameter("HTTP_HOST", "example.org");

    let domains = h.module.internal_domains().unwrap();
    assert_eq!(domains.len(), 2);
    assert!(domains[0].is_match("example.org"));
    assert!(!domains[0].is_match("exampleXorg"));
    assert!(!domains[0].is_match("www.example.org"));
    assert!(domains[1].is_match("admin.example.com"));
}
