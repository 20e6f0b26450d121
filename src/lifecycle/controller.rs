//! lifecycle::controller
//!
//! The per-object lifecycle state machine.
//!
//! # Architecture
//!
//! One controller is bound to one [`ObjectHandle`] and one backend for its
//! whole life. It is the ONLY component that issues mutating requests for
//! that object; every operation updates the controller in place and stores
//! an [`OperationResult`] snapshot under the step that produced it.
//!
//! The happy path is
//! `validate → create → lock → update → check → unlock → activate`,
//! but operations do not hard-enforce their predecessors - the backend
//! re-validates everything - so partial chains (probe reads, check of
//! unsaved content, delete for cleanup) are first-class.
//!
//! # Controller Contract
//!
//! 1. `lock()` enters a stateful session scope before acquiring the token
//! 2. `update`/`check(inactive)`/`unlock` fail with `LockRequired` when no
//!    token is held
//! 3. Every failing operation appends exactly one [`ErrorLog`] entry before
//!    returning the error
//! 4. `force_unlock()` is idempotent, swallows release errors, and reverts
//!    the session scope - always safe on cleanup paths
//! 5. A fresh `validate()` is the only operation that clears the error log
//!
//! # Example
//!
//! ```ignore
//! let mut controller = ObjectLifecycleController::new(backend, handle);
//! let run = async {
//!     controller.validate(&config).await?;
//!     controller.create(&config).await?;
//!     controller.lock().await?;
//!     controller.update(source).await?;
//!     controller.check(ObjectVersion::Inactive, None).await?;
//!     controller.unlock().await?;
//!     controller.activate().await
//! };
//! if run.await.is_err() {
//!     controller.force_unlock().await; // release whatever is still held
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::locks::{LockAcquireError, LockManager, LockReleaseError};
use super::session::StatefulScope;
use super::strategy::{strategy_for, ObjectStrategy, StepContext};
use crate::backend::{Backend, BackendError, RequestSpec};
use crate::core::types::{
    ErrorLog, LifecycleState, LockToken, ObjectHandle, ObjectVersion, OperationResult, Step,
};

/// Errors from lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Pre-flight rule violation; recoverable by fixing the input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The object already exists.
    #[error("create conflict: {0}")]
    CreateConflict(String),

    /// Another session holds the edit lock. Retry later.
    #[error("lock conflict: {0}")]
    LockConflict(String),

    /// Programmer error: the step needs a held lock token.
    #[error("{step} requires a held lock")]
    LockRequired {
        /// Step that was attempted
        step: Step,
    },

    /// The backend rejected the new content; the lock stays held so the
    /// caller can fix the source and retry, or unlock.
    #[error("update rejected: {status} - {message}")]
    UpdateRejected {
        /// Backend status code
        status: u16,
        /// Backend message
        message: String,
    },

    /// The inactive version has unresolved check errors.
    #[error("activation blocked: {0}")]
    ActivationBlocked(String),

    /// The held token no longer matches the backend's lock.
    #[error("stale lock token: {0}")]
    StaleLock(String),

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The per-object lifecycle state machine.
pub struct ObjectLifecycleController {
    backend: Arc<dyn Backend>,
    strategy: Box<dyn ObjectStrategy>,
    locks: LockManager,
    handle: ObjectHandle,
    transport: Option<String>,
    state: LifecycleState,
    lock_token: Option<LockToken>,
    /// Alive exactly while `lock_token` is held; dropping it reverts the
    /// backend to stateless mode.
    session_scope: Option<StatefulScope>,
    results: HashMap<Step, OperationResult>,
    error_log: ErrorLog,
}

impl ObjectLifecycleController {
    /// Bind a controller to one object on one backend.
    pub fn new(backend: Arc<dyn Backend>, handle: ObjectHandle) -> Self {
        let strategy = strategy_for(&handle);
        let locks = LockManager::new(backend.clone());
        Self {
            backend,
            strategy,
            locks,
            handle,
            transport: None,
            state: LifecycleState::Unvalidated,
            lock_token: None,
            session_scope: None,
            results: HashMap::new(),
            error_log: ErrorLog::new(),
        }
    }

    /// Attach a transport/change-record id to mutating steps.
    pub fn with_transport(mut self, transport: Option<String>) -> Self {
        self.transport = transport;
        self
    }

    /// The bound object.
    pub fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The held lock token, if any.
    pub fn lock_token(&self) -> Option<&LockToken> {
        self.lock_token.as_ref()
    }

    /// The accumulated error log for this chain.
    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Stored result of a prior step, if it ran successfully.
    pub fn result(&self, step: Step) -> Option<&OperationResult> {
        self.results.get(&step)
    }

    fn ctx(&self) -> StepContext<'_> {
        StepContext {
            handle: &self.handle,
            config: None,
            content: None,
            version: None,
            lock_token: self.lock_token.as_ref(),
            transport: self.transport.as_deref(),
        }
    }

    /// Record a failure in the log and return it.
    fn fail(&mut self, step: Step, error: LifecycleError) -> LifecycleError {
        self.error_log.record(step, &error);
        error
    }

    /// Record a failure that also moves the chain to `Failed`.
    fn fail_hard(&mut self, step: Step, error: LifecycleError) -> LifecycleError {
        self.state = LifecycleState::Failed;
        self.fail(step, error)
    }

    /// Issue one encoded step and store its decoded result.
    async fn run_step(
        &mut self,
        step: Step,
        spec: RequestSpec,
    ) -> Result<OperationResult, BackendError> {
        let response = self.backend.request(spec).await?;
        let result = self.strategy.decode(step, &response)?;
        self.results.insert(step, result.clone());
        Ok(result)
    }

    /// Pre-flight check against backend rules (name availability, package
    /// validity). Clears the error log; does not mutate backend state.
    pub async fn validate(
        &mut self,
        config: &serde_json::Value,
    ) -> Result<OperationResult, LifecycleError> {
        self.error_log.clear();
        let ctx = StepContext {
            config: Some(config),
            ..self.ctx()
        };
        let spec = self.strategy.encode(Step::Validate, &ctx);
        match self.run_step(Step::Validate, spec).await {
            Ok(result) => {
                self.state = LifecycleState::Validated;
                Ok(result)
            }
            Err(e) => {
                let error = match e {
                    BackendError::Conflict(message) => LifecycleError::Validation(message),
                    BackendError::Api { status, message } if status < 500 => {
                        LifecycleError::Validation(message)
                    }
                    other => LifecycleError::Backend(other),
                };
                Err(self.fail_hard(Step::Validate, error))
            }
        }
    }

    /// Create the object (metadata only; the body arrives via `update`).
    pub async fn create(
        &mut self,
        config: &serde_json::Value,
    ) -> Result<OperationResult, LifecycleError> {
        let ctx = StepContext {
            config: Some(config),
            ..self.ctx()
        };
        let spec = self.strategy.encode(Step::Create, &ctx);
        match self.run_step(Step::Create, spec).await {
            Ok(result) => {
                self.state = LifecycleState::Created;
                Ok(result)
            }
            Err(e) => {
                let error = match e {
                    BackendError::Conflict(message) => LifecycleError::CreateConflict(message),
                    other => LifecycleError::Backend(other),
                };
                Err(self.fail_hard(Step::Create, error))
            }
        }
    }

    /// Acquire the exclusive edit lock.
    ///
    /// Enters a stateful session scope first; if acquisition fails the
    /// scope is dropped immediately so the stateless mode is restored.
    pub async fn lock(&mut self) -> Result<OperationResult, LifecycleError> {
        let scope = StatefulScope::enter(self.backend.clone());
        match self.locks.acquire(&self.handle).await {
            Ok(token) => {
                self.results.insert(
                    Step::Lock,
                    OperationResult::now(200, serde_json::json!({"lockHandle": token.as_str()})),
                );
                self.lock_token = Some(token);
                self.session_scope = Some(scope);
                self.state = LifecycleState::Locked;
                Ok(self.results[&Step::Lock].clone())
            }
            Err(e) => {
                drop(scope);
                let error = match e {
                    LockAcquireError::Conflict { message, .. } => {
                        LifecycleError::LockConflict(message)
                    }
                    LockAcquireError::NoToken { handle } => {
                        LifecycleError::Backend(BackendError::Api {
                            status: 200,
                            message: format!("backend issued no lock token for {}", handle),
                        })
                    }
                    LockAcquireError::Backend(other) => LifecycleError::Backend(other),
                };
                Err(self.fail(Step::Lock, error))
            }
        }
    }

    /// Push a new body, producing an inactive version.
    ///
    /// Requires the held lock token. On rejection the lock stays held so
    /// the caller can fix the content and retry, or unlock.
    pub async fn update(&mut self, content: &str) -> Result<OperationResult, LifecycleError> {
        if self.lock_token.is_none() {
            let error = LifecycleError::LockRequired { step: Step::Update };
            return Err(self.fail(Step::Update, error));
        }
        let ctx = StepContext {
            content: Some(content),
            ..self.ctx()
        };
        let spec = self.strategy.encode(Step::Update, &ctx);
        match self.run_step(Step::Update, spec).await {
            Ok(result) => {
                self.state = LifecycleState::Updated;
                Ok(result)
            }
            Err(e) => {
                let error = match e {
                    BackendError::Conflict(message) => LifecycleError::UpdateRejected {
                        status: 409,
                        message,
                    },
                    BackendError::Api { status, message } if status < 500 => {
                        LifecycleError::UpdateRejected { status, message }
                    }
                    other => LifecycleError::Backend(other),
                };
                // Lock intentionally left held.
                Err(self.fail(Step::Update, error))
            }
        }
    }

    /// Run the backend's validation pass.
    ///
    /// With `unsaved_content` this checks the blob without requiring any
    /// ownership of the object - the only operation callable without it.
    /// Without content, checking the inactive version requires the held
    /// lock; checking the active version does not.
    pub async fn check(
        &mut self,
        version: ObjectVersion,
        unsaved_content: Option<&str>,
    ) -> Result<OperationResult, LifecycleError> {
        if unsaved_content.is_none()
            && version == ObjectVersion::Inactive
            && self.lock_token.is_none()
        {
            let error = LifecycleError::LockRequired { step: Step::Check };
            return Err(self.fail(Step::Check, error));
        }
        let ctx = StepContext {
            version: Some(version),
            content: unsaved_content,
            ..self.ctx()
        };
        let spec = self.strategy.encode(Step::Check, &ctx);
        match self.run_step(Step::Check, spec).await {
            Ok(result) => {
                if self.lock_token.is_some() || self.state == LifecycleState::Unlocked {
                    self.state = LifecycleState::Checked;
                }
                Ok(result)
            }
            Err(e) => Err(self.fail(Step::Check, LifecycleError::Backend(e))),
        }
    }

    /// Release the lock and revert the session to stateless.
    ///
    /// Valid even when nothing changed since `lock()` - a no-op edit is a
    /// legitimate chain.
    pub async fn unlock(&mut self) -> Result<OperationResult, LifecycleError> {
        let Some(token) = self.lock_token.clone() else {
            let error = LifecycleError::LockRequired { step: Step::Unlock };
            return Err(self.fail(Step::Unlock, error));
        };
        match self.locks.release(&self.handle, &token).await {
            Ok(()) => {
                self.lock_token = None;
                self.session_scope = None; // drop reverts to stateless
                self.state = LifecycleState::Unlocked;
                let result = OperationResult::now(200, serde_json::Value::Null);
                self.results.insert(Step::Unlock, result.clone());
                Ok(result)
            }
            Err(e) => {
                let error = match e {
                    LockReleaseError::StaleToken { message, .. } => {
                        LifecycleError::StaleLock(message)
                    }
                    LockReleaseError::Backend(other) => LifecycleError::Backend(other),
                };
                Err(self.fail(Step::Unlock, error))
            }
        }
    }

    /// Promote the inactive version to active.
    ///
    /// Requires no held lock - the backend forbids activating a locked
    /// object. Fails with [`LifecycleError::ActivationBlocked`] when the
    /// inactive version still has unresolved check errors.
    pub async fn activate(&mut self) -> Result<OperationResult, LifecycleError> {
        let spec = self.strategy.encode(Step::Activate, &self.ctx());
        match self.run_step(Step::Activate, spec).await {
            Ok(result) => {
                if let Some(message) = first_error_message(&result.data) {
                    let error = LifecycleError::ActivationBlocked(message);
                    return Err(self.fail_hard(Step::Activate, error));
                }
                self.state = LifecycleState::Activated;
                Ok(result)
            }
            Err(e) => Err(self.fail_hard(Step::Activate, LifecycleError::Backend(e))),
        }
    }

    /// Remove the object. Independent of local lock state: any held token
    /// is force-released first so the backend's own transient delete lock
    /// cannot self-conflict.
    pub async fn delete(
        &mut self,
        config: &serde_json::Value,
    ) -> Result<OperationResult, LifecycleError> {
        self.force_unlock().await;
        let ctx = StepContext {
            config: Some(config),
            ..self.ctx()
        };
        let spec = self.strategy.encode(Step::Delete, &ctx);
        match self.run_step(Step::Delete, spec).await {
            Ok(result) => {
                self.state = LifecycleState::Deleted;
                Ok(result)
            }
            Err(e) => Err(self.fail_hard(Step::Delete, LifecycleError::Backend(e))),
        }
    }

    /// Read a stored source version. Side-effect free; always permitted.
    pub async fn read(
        &mut self,
        version: ObjectVersion,
    ) -> Result<OperationResult, LifecycleError> {
        let ctx = StepContext {
            version: Some(version),
            ..self.ctx()
        };
        let spec = self.strategy.encode(Step::Read, &ctx);
        match self.run_step(Step::Read, spec).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.fail(Step::Read, LifecycleError::Backend(e))),
        }
    }

    /// Read the object's metadata. Side-effect free; always permitted.
    pub async fn read_metadata(&mut self) -> Result<OperationResult, LifecycleError> {
        let spec = self.strategy.encode(Step::ReadMetadata, &self.ctx());
        match self.run_step(Step::ReadMetadata, spec).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.fail(Step::ReadMetadata, LifecycleError::Backend(e))),
        }
    }

    /// Read the object's transport assignment. Side-effect free.
    pub async fn read_transport(&mut self) -> Result<OperationResult, LifecycleError> {
        let spec = self.strategy.encode(Step::ReadTransport, &self.ctx());
        match self.run_step(Step::ReadTransport, spec).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.fail(Step::ReadTransport, LifecycleError::Backend(e))),
        }
    }

    /// Best-effort cleanup: release a held token, swallowing any error,
    /// and revert the session scope. Safe to call at any time, including
    /// when no lock is held (no-op).
    pub async fn force_unlock(&mut self) {
        if let Some(token) = self.lock_token.take() {
            self.locks.force_release(&self.handle, &token).await;
            if matches!(
                self.state,
                LifecycleState::Locked | LifecycleState::Updated | LifecycleState::Checked
            ) {
                self.state = LifecycleState::Unlocked;
            }
        }
        self.session_scope = None;
    }
}

/// First error-severity message in a `{"messages": [...]}` payload.
fn first_error_message(data: &serde_json::Value) -> Option<String> {
    data.get("messages")?
        .as_array()?
        .iter()
        .find(|m| m.get("type").and_then(|t| t.as_str()) == Some("E"))
        .map(|m| {
            m.get("text")
                .and_then(|t| t.as_str())
                .unwrap_or("unspecified check error")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockOp};
    use crate::backend::SessionMode;
    use crate::core::types::{ObjectKind, ObjectName};

    fn handle() -> ObjectHandle {
        ObjectHandle::new(ObjectKind::Class, ObjectName::new("zcl_demo").unwrap())
    }

    fn controller(backend: &Arc<MockBackend>) -> ObjectLifecycleController {
        ObjectLifecycleController::new(backend.clone(), handle())
    }

    fn config() -> serde_json::Value {
        serde_json::json!({"package": "z_demo", "description": "demo class"})
    }

    #[tokio::test]
    async fn full_chain_reaches_activated() {
        let backend = Arc::new(MockBackend::new());
        let mut ctl = controller(&backend);

        ctl.validate(&config()).await.expect("validate");
        ctl.create(&config()).await.expect("create");
        ctl.lock().await.expect("lock");
        ctl.update("class zcl_demo definition. endclass.")
            .await
            .expect("update");
        ctl.check(ObjectVersion::Inactive, None).await.expect("check");
        ctl.unlock().await.expect("unlock");
        ctl.activate().await.expect("activate");

        assert_eq!(ctl.state(), LifecycleState::Activated);
        assert!(ctl.lock_token().is_none());
        assert!(ctl.error_log().is_empty());
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
    }

    #[tokio::test]
    async fn update_without_lock_is_lock_required() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "src");
        let mut ctl = controller(&backend);

        let result = ctl.update("new").await;
        assert!(matches!(
            result,
            Err(LifecycleError::LockRequired { step: Step::Update })
        ));
        assert_eq!(ctl.error_log().len(), 1);
    }

    #[tokio::test]
    async fn check_inactive_without_lock_is_lock_required() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "src");
        let mut ctl = controller(&backend);

        let result = ctl.check(ObjectVersion::Inactive, None).await;
        assert!(matches!(
            result,
            Err(LifecycleError::LockRequired { step: Step::Check })
        ));
    }

    #[tokio::test]
    async fn check_unsaved_content_needs_no_lock() {
        let backend = Arc::new(MockBackend::new());
        let mut ctl = controller(&backend);

        let result = ctl
            .check(ObjectVersion::Inactive, Some("draft content"))
            .await
            .expect("unsaved check");
        assert_eq!(result.data["messages"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn lock_failure_reverts_session_mode() {
        let backend = Arc::new(MockBackend::new());
        // Object absent: lock will 404.
        let mut ctl = controller(&backend);

        let result = ctl.lock().await;
        assert!(result.is_err());
        assert!(ctl.lock_token().is_none());
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
    }

    #[tokio::test]
    async fn update_rejection_keeps_lock_held() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "src");
        let mut ctl = controller(&backend);

        ctl.lock().await.expect("lock");
        backend.fail_once(
            MockOp::Update,
            crate::backend::BackendError::Api {
                status: 422,
                message: "schema rejected".into(),
            },
        );
        let result = ctl.update("bad content").await;
        assert!(matches!(
            result,
            Err(LifecycleError::UpdateRejected { status: 422, .. })
        ));
        assert!(ctl.lock_token().is_some(), "lock must stay held");
        assert!(backend.is_locked(&handle()));

        // Retry succeeds with the same lock.
        ctl.update("good content").await.expect("retry update");
        assert_eq!(ctl.state(), LifecycleState::Updated);
    }

    #[tokio::test]
    async fn force_unlock_is_idempotent() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "src");
        let mut ctl = controller(&backend);

        ctl.lock().await.expect("lock");
        ctl.force_unlock().await;
        assert!(ctl.lock_token().is_none());
        assert!(!backend.is_locked(&handle()));
        let errors_before = ctl.error_log().len();

        ctl.force_unlock().await; // second call: no error, no state change
        assert!(ctl.lock_token().is_none());
        assert_eq!(ctl.error_log().len(), errors_before);
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
    }

    #[tokio::test]
    async fn validate_clears_error_log() {
        let backend = Arc::new(MockBackend::new());
        let mut ctl = controller(&backend);

        let _ = ctl.update("no lock").await; // records one error
        assert_eq!(ctl.error_log().len(), 1);

        ctl.validate(&config()).await.expect("validate");
        assert!(ctl.error_log().is_empty());
    }

    #[tokio::test]
    async fn create_conflict_when_object_exists() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "src");
        let mut ctl = controller(&backend);

        let result = ctl.create(&config()).await;
        assert!(matches!(result, Err(LifecycleError::CreateConflict(_))));
        assert_eq!(ctl.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn activation_blocked_by_check_errors() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "old");
        let mut ctl = controller(&backend);

        ctl.lock().await.expect("lock");
        ctl.update("draft with syntax-error inside").await.expect("update");
        ctl.unlock().await.expect("unlock");

        let result = ctl.activate().await;
        assert!(matches!(result, Err(LifecycleError::ActivationBlocked(_))));
        assert_eq!(ctl.state(), LifecycleState::Failed);
        // The draft was not promoted.
        assert_eq!(backend.active_source(&handle()).as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn delete_releases_held_lock_first() {
        let backend = Arc::new(MockBackend::new());
        backend.seed_object(&handle(), "src");
        let mut ctl = controller(&backend);

        ctl.lock().await.expect("lock");
        ctl.delete(&serde_json::json!({})).await.expect("delete");
        assert_eq!(ctl.state(), LifecycleState::Deleted);
        assert!(!backend.has_object(&handle()));
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
    }

    #[tokio::test]
    async fn results_are_stored_per_step() {
        let backend = Arc::new(MockBackend::new());
        let mut ctl = controller(&backend);

        ctl.validate(&config()).await.expect("validate");
        ctl.create(&config()).await.expect("create");

        assert!(ctl.result(Step::Validate).is_some());
        assert_eq!(ctl.result(Step::Create).unwrap().status, 201);
        assert!(ctl.result(Step::Update).is_none());
    }

    #[tokio::test]
    async fn errors_accumulate_across_failed_steps() {
        let backend = Arc::new(MockBackend::new());
        let mut ctl = controller(&backend);

        let _ = ctl.update("no lock").await;
        let _ = ctl.unlock().await;
        assert_eq!(ctl.error_log().len(), 2);
        assert_eq!(ctl.error_log().entries()[0].step, Step::Update);
        assert_eq!(ctl.error_log().entries()[1].step, Step::Unlock);
    }
}
