//! Navigation helpers.

use super::Module;
use indexmap::IndexSet;
use regex::Regex;
use rehearsal_connector::{TestRequest, TestResponse, DEFAULT_HOST};
use rehearsal_core::router::{Router, Url};
use rehearsal_core::{AssertionFailure, ExecutionContext, HarnessError, HarnessResult};
use std::sync::Arc;

impl Module {
    /// Requests `uri` with `GET`.
    pub fn am_on_page(&mut self, uri: &str, ctx: &mut ExecutionContext) -> HarnessResult<TestResponse> {
        let request = TestRequest::get(uri)
            .build()
            .map_err(|e| HarnessError::configuration(e.to_string()))?;
        self.connector.do_request(&request, ctx)
    }

    /// Requests the URL of a named route.
    #[track_caller]
    pub fn am_on_route(
        &mut self,
        name: &str,
        params: &[(&str, &str)],
        ctx: &mut ExecutionContext,
    ) -> HarnessResult<TestResponse> {
        let uri = self.url()?.for_route(name, params)?;
        self.am_on_page(&uri, ctx)
    }

    /// Asserts that the last request went to the URL of a named route.
    #[track_caller]
    pub fn see_current_route_is(&self, name: &str) -> HarnessResult<()> {
        let uri = self.url()?.for_route(name, &[])?;
        self.see_current_url_equals(&uri);
        Ok(())
    }

    /// Asserts the URI of the last request.
    #[track_caller]
    pub fn see_current_url_equals(&self, uri: &str) {
        let current = self.connector.current_uri().unwrap_or_default();
        if current != uri {
            AssertionFailure::new(format!("Current URL is '{current}', expected '{uri}'")).raise();
        }
    }

    /// Returns patterns for the hosts the application answers for.
    ///
    /// The connector's `HTTP_HOST` comes first, followed by every hostname
    /// a route is restricted to.
    pub fn internal_domains(&self) -> HarnessResult<Vec<Regex>> {
        let mut hosts = IndexSet::new();
        hosts.insert(
            self.connector
                .server_parameter("HTTP_HOST")
                .unwrap_or(DEFAULT_HOST)
                .to_string(),
        );

        let di = self.di()?;
        if di.has("router") {
            let router = di.get::<Router>("router")?;
            hosts.extend(
                router
                    .routes()
                    .iter()
                    .filter_map(|route| route.hostname_value())
                    .filter(|host| !host.is_empty())
                    .map(str::to_string),
            );
        }

        hosts
            .iter()
            .map(|host| {
                Regex::new(&format!("^{}$", regex::escape(host)))
                    .map_err(|e| HarnessError::configuration(format!("Invalid host {host}: {e}")))
            })
            .collect()
    }

    #[track_caller]
    fn url(&self) -> HarnessResult<Arc<Url>> {
        let di = self.di()?;
        if !di.has("url") {
            AssertionFailure::new("Unable to resolve \"url\" service.").raise();
        }
        di.get_shared::<Url>("url")
    }
}
