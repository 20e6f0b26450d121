//! lifecycle::locks
//!
//! Exclusive edit-lock management for one remote object.
//!
//! # Architecture
//!
//! The backend enforces exclusive editing: mutating an object requires a
//! lock token issued to the requesting session. The [`LockManager`] wraps
//! acquisition and release of that token. It does not retain tokens -
//! ownership lives in the lifecycle controller that requested the lock.
//!
//! # Invariants
//!
//! - `acquire` maps a backend 423/409 to [`LockAcquireError::Conflict`]
//! - `release` fails on a stale or mismatched token
//! - `force_release` never fails; errors are swallowed (best-effort cleanup)

use std::sync::Arc;

use thiserror::Error;

use super::strategy::{strategy_for, StepContext};
use crate::backend::{Backend, BackendError};
use crate::core::types::{LockToken, ObjectHandle, Step};

/// Errors from lock acquisition.
#[derive(Debug, Error)]
pub enum LockAcquireError {
    /// Another session holds the lock. Retry later, not immediately.
    #[error("object {handle} is locked by another session: {message}")]
    Conflict {
        /// The contested object
        handle: ObjectHandle,
        /// Backend-reported detail
        message: String,
    },

    /// The backend responded without a usable token.
    #[error("backend issued no lock token for {handle}")]
    NoToken {
        /// The object that was being locked
        handle: ObjectHandle,
    },

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors from lock release.
#[derive(Debug, Error)]
pub enum LockReleaseError {
    /// The token is stale or does not match the holder.
    #[error("stale or mismatched lock token for {handle}: {message}")]
    StaleToken {
        /// The object that was being unlocked
        handle: ObjectHandle,
        /// Backend-reported detail
        message: String,
    },

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Acquires and releases exclusive edit tokens for remote objects.
#[derive(Clone)]
pub struct LockManager {
    backend: Arc<dyn Backend>,
}

impl LockManager {
    /// Create a lock manager over a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Acquire the exclusive edit lock for one object.
    ///
    /// # Errors
    ///
    /// - [`LockAcquireError::Conflict`] if another session holds the lock
    /// - [`LockAcquireError::NoToken`] if the backend answered success
    ///   without a token
    pub async fn acquire(&self, handle: &ObjectHandle) -> Result<LockToken, LockAcquireError> {
        let strategy = strategy_for(handle);
        let spec = strategy.encode(Step::Lock, &StepContext::bare(handle));

        let response = self.backend.request(spec).await.map_err(|e| match e {
            BackendError::LockConflict(message) | BackendError::Conflict(message) => {
                LockAcquireError::Conflict {
                    handle: handle.clone(),
                    message,
                }
            }
            other => LockAcquireError::Backend(other),
        })?;

        let result = strategy.decode(Step::Lock, &response)?;
        let token = result
            .data
            .get("lockHandle")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LockAcquireError::NoToken {
                handle: handle.clone(),
            })?;

        Ok(LockToken::new(token))
    }

    /// Release a held lock.
    ///
    /// # Errors
    ///
    /// - [`LockReleaseError::StaleToken`] if the backend rejects the token
    pub async fn release(
        &self,
        handle: &ObjectHandle,
        token: &LockToken,
    ) -> Result<(), LockReleaseError> {
        let strategy = strategy_for(handle);
        let ctx = StepContext {
            lock_token: Some(token),
            ..StepContext::bare(handle)
        };
        let spec = strategy.encode(Step::Unlock, &ctx);

        self.backend.request(spec).await.map_err(|e| match e {
            BackendError::Conflict(message) | BackendError::LockConflict(message) => {
                LockReleaseError::StaleToken {
                    handle: handle.clone(),
                    message,
                }
            }
            other => LockReleaseError::Backend(other),
        })?;

        Ok(())
    }

    /// Best-effort release: swallow any failure.
    ///
    /// Safe to call on cleanup paths where the controller cannot know
    /// whether the token is still valid. The backend reaps orphaned locks
    /// on session timeout, so a failed force-release self-heals.
    pub async fn force_release(&self, handle: &ObjectHandle, token: &LockToken) {
        let _ = self.release(handle, token).await;
    }
}
