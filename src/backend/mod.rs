//! backend
//!
//! Abstraction over the remote versioned-edit backend.
//!
//! # Submodules
//!
//! - [`traits`] - The `Backend` trait and request/response types
//! - [`http`] - reqwest implementation with CSRF and cookie sessions
//! - [`mock`] - Deterministic in-memory implementation for tests

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpBackend;
pub use traits::{Backend, BackendError, Method, RequestSpec, ResponseData, SessionMode};
