//! # Rehearsal Session
//!
//! Session isolation for tests.
//!
//! - [`MemorySession`] - A volatile session adapter with id-namespaced keys
//! - [`TestSessionManager`] - A session manager that never needs a transport-level session
//! - [`AdapterRegistry`] - Session adapter constructors by configured name
//!
//! The lifecycle controller installs a fresh adapter in a fresh
//! [`TestSessionManager`] before every test, so no session state survives
//! from one test to the next.

#![doc(html_root_url = "https://docs.rs/rehearsal-session/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod manager;
mod memory;
mod registry;

pub use manager::TestSessionManager;
pub use memory::{generate_id, MemorySession, UNIQUE_ID_OPTION};
pub use registry::{AdapterFactory, AdapterRegistry, MEMORY_ADAPTER};
