//! # Rehearsal Connector
//!
//! Drives framework applications through simulated requests, in process,
//! without binding a port.
//!
//! ## Key Features
//!
//! - **Request Builder**: parameters, files, cookies, server variables and a raw body
//! - **Ambient State**: a request becomes the server/GET/POST/cookie/file buckets
//!   the application reads, plus an installed request object
//! - **Both Application Kinds**: full-stack applications returning a response,
//!   and micro applications writing to the `response` service
//! - **Response Assertions**: status, headers, `Set-Cookie` and body checks
//!
//! ## Example
//!
//! ```
//! use rehearsal_connector::{Connector, TestFile, TestRequest};
//! use rehearsal_core::application::ApplicationSupplier;
//! use rehearsal_core::fixtures::{MemoryConnection, MvcApplication};
//! use rehearsal_core::ExecutionContext;
//! use std::sync::Arc;
//!
//! let mut connector = Connector::new();
//! connector.set_application(ApplicationSupplier::instance(MvcApplication::new(Arc::new(
//!     MemoryConnection::new(),
//! ))));
//! let mut ctx = ExecutionContext::new();
//!
//! let upload = TestRequest::post("/upload")
//!     .file(TestFile::new("doc", "SomeFile.ext", "/tmp/SomeFile.ext"))
//!     .build()
//!     .unwrap();
//! connector
//!     .do_request(&upload, &mut ctx)
//!     .unwrap()
//!     .assert_status_code(200)
//!     .assert_body_eq("doc=SomeFile.ext");
//! ```

#![doc(html_root_url = "https://docs.rs/rehearsal-connector/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod connector;
mod error;
mod request;
mod response;
pub mod superglobals;

pub use connector::{Connector, DEFAULT_HOST};
pub use error::ConnectorError;
pub use request::{TestFile, TestRequest, TestRequestBuilder};
pub use response::TestResponse;
