//! # Rehearsal Core
//!
//! Core types and capabilities shared by the Rehearsal crates.
//!
//! This crate provides the foundation the connector and the lifecycle
//! controller are built on:
//!
//! - [`ExecutionContext`] - Explicit ambient request state and the default container slot
//! - [`di::Container`] - Named-service dependency injection container
//! - [`application`] - Application capabilities, suppliers and bootstrap loading
//! - [`http`] - The framework request/response model
//! - [`cookies`], [`session`], [`db`], [`orm`], [`router`] - Framework service capabilities
//! - [`params`] - Bracket-notation parameter codec
//! - [`HarnessError`] - Standard error types
//! - [`fixtures`] - Reference applications and an in-memory database for tests

#![doc(html_root_url = "https://docs.rs/rehearsal-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod application;
mod context;
pub mod cookies;
pub mod db;
pub mod di;
mod error;
pub mod fixtures;
pub mod http;
pub mod orm;
pub mod params;
pub mod router;
pub mod session;

pub use context::{AmbientState, ExecutionContext, FileMap};
pub use error::{AssertionFailure, HarnessError, HarnessResult};
