//! backend::traits
//!
//! Backend trait definition for the remote versioned-edit service.
//!
//! # Design
//!
//! The `Backend` trait is async because every operation is network I/O.
//! It is deliberately narrow: the lifecycle layer builds [`RequestSpec`]s
//! through its wire strategy and interprets [`ResponseData`]; the backend
//! only moves bytes, tracks session credentials, and maps transport-level
//! failures.
//!
//! Session handling is part of the contract: while an exclusive edit lock
//! is held, requests must be pinned to one backend session
//! ([`SessionMode::Stateful`]); outside a locked window the connection runs
//! stateless so the backend may distribute load freely.
//!
//! # Example
//!
//! ```ignore
//! use stagehand::backend::{Backend, RequestSpec};
//!
//! async fn probe(backend: &dyn Backend) -> Result<bool, BackendError> {
//!     let spec = RequestSpec::get("classes/zcl_demo");
//!     match backend.request(spec).await {
//!         Ok(_) => Ok(true),
//!         Err(BackendError::NotFound(_)) => Ok(false),
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from backend operations.
///
/// These map to the common failure modes of a versioned-edit backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Authentication is required but not configured.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (bad credentials, expired session).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    ///
    /// For existence probes this is a valid success signal, not a fault.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists or the request conflicts with its
    /// current state (409-equivalent).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Another session holds the exclusive edit lock (423-equivalent).
    /// Callers should retry later, not immediately.
    #[error("locked by another session: {0}")]
    LockConflict(String),

    /// The backend rejected the request (any other non-success status).
    #[error("backend error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the backend
        message: String,
    },

    /// Network, connection, or timeout error. Safe to retry the same step.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// HTTP status attached to this error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::NotFound(_) => Some(404),
            BackendError::Conflict(_) => Some(409),
            BackendError::LockConflict(_) => Some(423),
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection session mode.
///
/// Stateful pins all requests to one backend session instance, which the
/// backend requires while an exclusive edit lock is held. Stateless allows
/// free load distribution and is the default outside locked windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Requests pinned to one backend session (required while locked).
    Stateful,
    /// Requests freely distributed (default).
    #[default]
    Stateless,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Stateful => write!(f, "stateful"),
            SessionMode::Stateless => write!(f, "stateless"),
        }
    }
}

/// HTTP method for a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One backend request, built by the wire strategy.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the backend root, without a leading slash.
    pub path: String,
    /// Query parameters, in insertion order.
    pub query: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<String>,
    /// Content type of the body.
    pub content_type: Option<String>,
}

impl RequestSpec {
    /// Build a request with no query, body, or content type.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    /// Convenience constructor for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Convenience constructor for a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Convenience constructor for a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Convenience constructor for a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a body with a content type.
    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }
}

/// One backend response.
#[derive(Debug, Clone)]
pub struct ResponseData {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
    /// Response headers, lowercased keys.
    pub headers: HashMap<String, String>,
}

impl ResponseData {
    /// Build a response with no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Look up a header by lowercased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Parse the body as JSON, defaulting to `Null` for an empty body.
    pub fn json(&self) -> Result<serde_json::Value, BackendError> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| BackendError::Api {
            status: self.status,
            message: format!("failed to parse response body: {}", e),
        })
    }
}

/// The Backend trait: the connection to the versioned-edit service.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; controllers share a backend via
/// `Arc<dyn Backend>`.
///
/// # Error Handling
///
/// `request` returns `Err` for transport failures and non-success statuses.
/// Callers should treat:
/// - `LockConflict`: back off, another session holds the lock
/// - `Conflict`: the object already exists or the state moved underneath
/// - `NotFound`: possibly a valid probe result
/// - `Transport`: safe to retry the same step
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend implementation name (e.g. "http", "mock").
    fn name(&self) -> &'static str;

    /// Issue one request.
    ///
    /// # Errors
    ///
    /// Any [`BackendError`]; non-2xx statuses are mapped to the matching
    /// variant with the backend's message attached.
    async fn request(&self, spec: RequestSpec) -> Result<ResponseData, BackendError>;

    /// Switch the connection between stateful and stateless sessions.
    ///
    /// Takes effect on the next request. Must be cheap and infallible;
    /// implementations hold the mode as interior state.
    fn set_session_mode(&self, mode: SessionMode);

    /// Current session mode.
    fn session_mode(&self) -> SessionMode;

    /// Hard-reset the connection: drop the pinned session and any cached
    /// credentials so the next request starts fresh.
    fn reset(&self);
}
