//! lifecycle::session
//!
//! Scoped stateful-session context.
//!
//! # Architecture
//!
//! While an exclusive edit lock is held, the backend requires all requests
//! to be pinned to one session. A raw mode toggle on the shared connection
//! leaks stateful sessions onto unrelated calls whenever an exit path is
//! missed, so the toggle is wrapped in an RAII guard instead: construct a
//! [`StatefulScope`] to enter stateful mode, and the drop reverts to
//! stateless on every exit path - success, error, or forced cleanup.
//!
//! # Invariants
//!
//! - The backend is stateful exactly while a `StatefulScope` is alive
//! - Reversion on drop is unconditional and infallible

use std::sync::Arc;

use crate::backend::{Backend, SessionMode};

/// RAII guard holding the backend in stateful session mode.
///
/// # Example
///
/// ```ignore
/// let scope = StatefulScope::enter(backend.clone());
/// // requests are session-pinned here
/// drop(scope); // backend reverted to stateless
/// ```
pub struct StatefulScope {
    backend: Arc<dyn Backend>,
}

impl StatefulScope {
    /// Switch the backend to stateful mode and return the guard.
    pub fn enter(backend: Arc<dyn Backend>) -> Self {
        backend.set_session_mode(SessionMode::Stateful);
        Self { backend }
    }
}

impl Drop for StatefulScope {
    fn drop(&mut self) {
        self.backend.set_session_mode(SessionMode::Stateless);
    }
}
