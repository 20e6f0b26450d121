//! backend::mock
//!
//! Mock backend implementation for deterministic testing.
//!
//! # Design
//!
//! The mock keeps an in-memory object store with the same observable
//! semantics as the real backend: exclusive lock tokens, inactive/active
//! source versions, activation that refuses locked or broken objects, and
//! a scripted failure hook for error-path tests.
//!
//! Check/activation diagnostics are derived from the content itself: any
//! source containing the marker `syntax-error` produces an error message,
//! so tests can stage a broken draft without scripting.
//!
//! # Example
//!
//! ```
//! use stagehand::backend::mock::MockBackend;
//! use stagehand::backend::{Backend, RequestSpec};
//! use stagehand::core::types::{ObjectHandle, ObjectKind, ObjectName};
//!
//! # tokio_test::block_on(async {
//! let backend = MockBackend::new();
//! let handle = ObjectHandle::new(ObjectKind::Class, ObjectName::new("zcl_demo").unwrap());
//! backend.seed_object(&handle, "class zcl_demo definition. endclass.");
//!
//! let resp = backend.request(RequestSpec::get("classes/zcl_demo")).await.unwrap();
//! assert_eq!(resp.status, 200);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::traits::{Backend, BackendError, Method, RequestSpec, ResponseData, SessionMode};
use crate::core::types::ObjectHandle;

/// Marker that makes a source fail checks and activation.
pub const SYNTAX_ERROR_MARKER: &str = "syntax-error";

/// One stored object.
#[derive(Debug, Clone, Default)]
struct ObjectState {
    metadata: serde_json::Value,
    inactive_source: Option<String>,
    active_source: Option<String>,
    lock_token: Option<String>,
}

/// Which backend operation a scripted failure targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Validate,
    Create,
    Lock,
    Update,
    Check,
    Unlock,
    Activate,
    Delete,
    Read,
}

/// Scripted failure: the next matching operation fails with this error.
#[derive(Debug, Clone)]
pub struct FailOn {
    /// Operation to fail.
    pub op: MockOp,
    /// Error to return.
    pub error: BackendError,
    /// Fail only once, then clear the script.
    pub once: bool,
}

/// Recorded call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Classified operation.
    pub op: MockOp,
    /// Request path.
    pub path: String,
}

#[derive(Debug, Default)]
struct MockInner {
    objects: HashMap<String, ObjectState>,
    mode: SessionMode,
    fail_on: Option<FailOn>,
    calls: Vec<RecordedCall>,
    resets: usize,
}

/// Mock backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockInner>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail the next matching operation once.
    pub fn fail_once(&self, op: MockOp, error: BackendError) {
        self.inner.lock().unwrap().fail_on = Some(FailOn {
            op,
            error,
            once: true,
        });
    }

    /// Configure the mock to fail every matching operation.
    pub fn fail_always(&self, op: MockOp, error: BackendError) {
        self.inner.lock().unwrap().fail_on = Some(FailOn {
            op,
            error,
            once: false,
        });
    }

    /// Clear the failure script.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Seed an existing object with an active source version.
    pub fn seed_object(&self, handle: &ObjectHandle, active_source: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(
            handle.path(),
            ObjectState {
                metadata: serde_json::json!({
                    "name": handle.name.as_str(),
                    "type": handle.kind.to_string(),
                }),
                active_source: Some(active_source.to_string()),
                ..ObjectState::default()
            },
        );
    }

    /// Whether an object exists.
    pub fn has_object(&self, handle: &ObjectHandle) -> bool {
        self.inner.lock().unwrap().objects.contains_key(&handle.path())
    }

    /// Whether an object is currently locked.
    pub fn is_locked(&self, handle: &ObjectHandle) -> bool {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&handle.path())
            .is_some_and(|o| o.lock_token.is_some())
    }

    /// The active source of an object, if any.
    pub fn active_source(&self, handle: &ObjectHandle) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&handle.path())
            .and_then(|o| o.active_source.clone())
    }

    /// The inactive (draft) source of an object, if any.
    pub fn inactive_source(&self, handle: &ObjectHandle) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&handle.path())
            .and_then(|o| o.inactive_source.clone())
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// How many times `reset` was invoked.
    pub fn reset_count(&self) -> usize {
        self.inner.lock().unwrap().resets
    }

    /// Classify a request into a mock operation.
    fn classify(spec: &RequestSpec) -> MockOp {
        let has_query = |key: &str, value: &str| {
            spec.query.iter().any(|(k, v)| k == key && v == value)
        };
        match spec.method {
            Method::Post if spec.path == "validation" => MockOp::Validate,
            Method::Post if spec.path == "activation" => MockOp::Activate,
            Method::Post if spec.path.ends_with("/checkruns") => MockOp::Check,
            Method::Post if has_query("action", "lock") => MockOp::Lock,
            Method::Post if has_query("action", "unlock") => MockOp::Unlock,
            Method::Post => MockOp::Create,
            Method::Put => MockOp::Update,
            Method::Delete => MockOp::Delete,
            Method::Get => MockOp::Read,
        }
    }

    fn take_scripted_failure(inner: &mut MockInner, op: MockOp) -> Option<BackendError> {
        match &inner.fail_on {
            Some(fail) if fail.op == op => {
                let error = fail.error.clone();
                if fail.once {
                    inner.fail_on = None;
                }
                Some(error)
            }
            _ => None,
        }
    }

    fn query_value<'a>(spec: &'a RequestSpec, key: &str) -> Option<&'a str> {
        spec.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Diagnostic messages for a source blob.
    fn messages_for(source: &str) -> serde_json::Value {
        if source.contains(SYNTAX_ERROR_MARKER) {
            serde_json::json!([{ "type": "E", "text": "syntax error in source" }])
        } else {
            serde_json::json!([])
        }
    }

    fn json_response(status: u16, value: serde_json::Value) -> ResponseData {
        let mut response = ResponseData::new(status, value.to_string());
        response
            .headers
            .insert("content-type".into(), "application/json".into());
        response
    }

    fn text_response(status: u16, body: &str) -> ResponseData {
        let mut response = ResponseData::new(status, body);
        response
            .headers
            .insert("content-type".into(), "text/plain; charset=utf-8".into());
        response
    }

    /// Resource key for a path like `classes/zcl_demo[/variant]/suffix`.
    fn object_key(path: &str, suffix: Option<&str>) -> String {
        match suffix {
            Some(s) => path
                .strip_suffix(s)
                .and_then(|p| p.strip_suffix('/'))
                .unwrap_or(path)
                .to_string(),
            None => path.to_string(),
        }
    }

    fn handle_request(&self, spec: &RequestSpec) -> Result<ResponseData, BackendError> {
        let op = Self::classify(spec);
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall {
            op,
            path: spec.path.clone(),
        });

        if let Some(error) = Self::take_scripted_failure(&mut inner, op) {
            return Err(error);
        }

        match op {
            MockOp::Validate => {
                let kind = Self::query_value(spec, "objectType").unwrap_or_default();
                let name = Self::query_value(spec, "name").unwrap_or_default();
                let exists = inner
                    .objects
                    .keys()
                    .any(|key| key.ends_with(&format!("/{}", name)) || key == name);
                if exists {
                    return Err(BackendError::Conflict(format!(
                        "{} name '{}' is already in use",
                        kind, name
                    )));
                }
                Ok(Self::json_response(200, serde_json::json!({"valid": true})))
            }
            MockOp::Create => {
                let body: serde_json::Value = spec
                    .body
                    .as_deref()
                    .and_then(|b| serde_json::from_str(b).ok())
                    .unwrap_or(serde_json::json!({}));
                let name = body
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                let key = format!("{}/{}", spec.path, name);
                if inner.objects.contains_key(&key) {
                    return Err(BackendError::Conflict(format!(
                        "object '{}' already exists",
                        name
                    )));
                }
                inner.objects.insert(
                    key,
                    ObjectState {
                        metadata: body,
                        ..ObjectState::default()
                    },
                );
                Ok(Self::json_response(201, serde_json::json!({"name": name})))
            }
            MockOp::Lock => {
                let key = Self::object_key(&spec.path, None);
                let object = inner
                    .objects
                    .get_mut(&key)
                    .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                if let Some(token) = &object.lock_token {
                    return Err(BackendError::LockConflict(format!(
                        "lock {} is already held",
                        token
                    )));
                }
                let token = Uuid::new_v4().to_string();
                object.lock_token = Some(token.clone());
                Ok(Self::json_response(
                    200,
                    serde_json::json!({"lockHandle": token}),
                ))
            }
            MockOp::Unlock => {
                let key = Self::object_key(&spec.path, None);
                let presented = Self::query_value(spec, "lockHandle").unwrap_or_default().to_string();
                let object = inner
                    .objects
                    .get_mut(&key)
                    .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                match &object.lock_token {
                    Some(token) if *token == presented => {
                        object.lock_token = None;
                        Ok(Self::json_response(200, serde_json::json!({})))
                    }
                    Some(_) => Err(BackendError::Conflict("stale lock handle".into())),
                    None => Err(BackendError::Conflict("object is not locked".into())),
                }
            }
            MockOp::Update => {
                let key = Self::object_key(&spec.path, Some("source"));
                let presented = Self::query_value(spec, "lockHandle").unwrap_or_default().to_string();
                let object = inner
                    .objects
                    .get_mut(&key)
                    .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                match &object.lock_token {
                    Some(token) if *token == presented => {
                        object.inactive_source = spec.body.clone();
                        Ok(Self::json_response(200, serde_json::json!({})))
                    }
                    _ => Err(BackendError::Conflict(
                        "update requires the lock holder's handle".into(),
                    )),
                }
            }
            MockOp::Check => {
                let key = Self::object_key(&spec.path, Some("checkruns"));
                let version = Self::query_value(spec, "version").unwrap_or("inactive");
                // Unsaved-content checks need no object ownership at all.
                if let Some(content) = &spec.body {
                    return Ok(Self::json_response(
                        200,
                        serde_json::json!({"messages": Self::messages_for(content)}),
                    ));
                }
                let object = inner
                    .objects
                    .get(&key)
                    .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                let source = match version {
                    "active" => object.active_source.clone(),
                    _ => object.inactive_source.clone(),
                };
                let source = source.ok_or_else(|| {
                    BackendError::NotFound(format!("no {} version for {}", version, key))
                })?;
                Ok(Self::json_response(
                    200,
                    serde_json::json!({"messages": Self::messages_for(&source)}),
                ))
            }
            MockOp::Activate => {
                let body: serde_json::Value = spec
                    .body
                    .as_deref()
                    .and_then(|b| serde_json::from_str(b).ok())
                    .unwrap_or(serde_json::json!({}));
                let key = body
                    .get("uri")
                    .and_then(|u| u.as_str())
                    .unwrap_or_default()
                    .to_string();
                let object = inner
                    .objects
                    .get_mut(&key)
                    .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                // The backend forbids activating a locked object.
                if object.lock_token.is_some() {
                    return Err(BackendError::Conflict(
                        "cannot activate a locked object".into(),
                    ));
                }
                let draft = match object.inactive_source.clone() {
                    Some(draft) => draft,
                    None => {
                        return Ok(Self::json_response(
                            200,
                            serde_json::json!({"messages": []}),
                        ))
                    }
                };
                let messages = Self::messages_for(&draft);
                if messages.as_array().is_some_and(|m| !m.is_empty()) {
                    return Ok(Self::json_response(
                        200,
                        serde_json::json!({"messages": messages}),
                    ));
                }
                object.active_source = Some(draft);
                object.inactive_source = None;
                Ok(Self::json_response(200, serde_json::json!({"messages": []})))
            }
            MockOp::Delete => {
                let key = Self::object_key(&spec.path, None);
                if inner.objects.remove(&key).is_none() {
                    return Err(BackendError::NotFound(format!("no object at {}", key)));
                }
                Ok(Self::json_response(200, serde_json::json!({})))
            }
            MockOp::Read => {
                if spec.path.ends_with("/source") {
                    let key = Self::object_key(&spec.path, Some("source"));
                    let version = Self::query_value(spec, "version").unwrap_or("active");
                    let object = inner
                        .objects
                        .get(&key)
                        .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                    let source = match version {
                        "inactive" => object.inactive_source.clone(),
                        _ => object.active_source.clone(),
                    };
                    let source = source.ok_or_else(|| {
                        BackendError::NotFound(format!("no {} version for {}", version, key))
                    })?;
                    return Ok(Self::text_response(200, &source));
                }
                if spec.path.ends_with("/transport") {
                    return Ok(Self::json_response(
                        200,
                        serde_json::json!({"transport": "DEVK900001", "status": "modifiable"}),
                    ));
                }
                let key = Self::object_key(&spec.path, None);
                let object = inner
                    .objects
                    .get(&key)
                    .ok_or_else(|| BackendError::NotFound(format!("no object at {}", key)))?;
                let mut metadata = object.metadata.clone();
                if let Some(map) = metadata.as_object_mut() {
                    map.insert("locked".into(), serde_json::json!(object.lock_token.is_some()));
                    map.insert(
                        "hasInactiveVersion".into(),
                        serde_json::json!(object.inactive_source.is_some()),
                    );
                }
                Ok(Self::json_response(200, metadata))
            }
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn request(&self, spec: RequestSpec) -> Result<ResponseData, BackendError> {
        self.handle_request(&spec)
    }

    fn set_session_mode(&self, mode: SessionMode) {
        self.inner.lock().unwrap().mode = mode;
    }

    fn session_mode(&self) -> SessionMode {
        self.inner.lock().unwrap().mode
    }

    fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.mode = SessionMode::Stateless;
        inner.resets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ObjectKind, ObjectName};

    fn handle() -> ObjectHandle {
        ObjectHandle::new(ObjectKind::Class, ObjectName::new("zcl_demo").unwrap())
    }

    fn create_spec(name: &str) -> RequestSpec {
        RequestSpec::post("classes").body(
            "application/json",
            serde_json::json!({"name": name}).to_string(),
        )
    }

    #[tokio::test]
    async fn create_then_read_metadata() {
        let backend = MockBackend::new();
        let created = backend.request(create_spec("zcl_demo")).await.unwrap();
        assert_eq!(created.status, 201);

        let meta = backend
            .request(RequestSpec::get("classes/zcl_demo"))
            .await
            .unwrap();
        let json = meta.json().unwrap();
        assert_eq!(json["name"], "zcl_demo");
        assert_eq!(json["locked"], false);
    }

    #[tokio::test]
    async fn create_twice_is_conflict() {
        let backend = MockBackend::new();
        backend.request(create_spec("zcl_demo")).await.unwrap();
        let second = backend.request(create_spec("zcl_demo")).await;
        assert!(matches!(second, Err(BackendError::Conflict(_))));
    }

    #[tokio::test]
    async fn lock_issues_distinct_tokens() {
        let backend = MockBackend::new();
        backend.seed_object(&handle(), "src");
        let other = ObjectHandle::new(ObjectKind::Class, ObjectName::new("zcl_other").unwrap());
        backend.seed_object(&other, "src");

        let lock = |path: &str| {
            RequestSpec::post(path)
                .query("action", "lock")
                .query("accessMode", "modify")
        };
        let first = backend.request(lock("classes/zcl_demo")).await.unwrap();
        let second = backend.request(lock("classes/zcl_other")).await.unwrap();
        let t1 = first.json().unwrap()["lockHandle"].as_str().unwrap().to_string();
        let t2 = second.json().unwrap()["lockHandle"].as_str().unwrap().to_string();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn update_requires_matching_lock_handle() {
        let backend = MockBackend::new();
        backend.seed_object(&handle(), "src");

        let update = RequestSpec::put("classes/zcl_demo/source")
            .query("lockHandle", "wrong")
            .body("text/plain; charset=utf-8", "new source");
        let result = backend.request(update).await;
        assert!(matches!(result, Err(BackendError::Conflict(_))));
    }

    #[tokio::test]
    async fn activation_promotes_draft() {
        let backend = MockBackend::new();
        backend.seed_object(&handle(), "old");

        let lock = backend
            .request(
                RequestSpec::post("classes/zcl_demo")
                    .query("action", "lock")
                    .query("accessMode", "modify"),
            )
            .await
            .unwrap();
        let token = lock.json().unwrap()["lockHandle"].as_str().unwrap().to_string();

        backend
            .request(
                RequestSpec::put("classes/zcl_demo/source")
                    .query("lockHandle", &token)
                    .body("text/plain; charset=utf-8", "new"),
            )
            .await
            .unwrap();
        backend
            .request(
                RequestSpec::post("classes/zcl_demo")
                    .query("action", "unlock")
                    .query("lockHandle", &token),
            )
            .await
            .unwrap();

        let activation = backend
            .request(RequestSpec::post("activation").body(
                "application/json",
                serde_json::json!({"name": "zcl_demo", "uri": "classes/zcl_demo"}).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(activation.json().unwrap()["messages"], serde_json::json!([]));
        assert_eq!(backend.active_source(&handle()).as_deref(), Some("new"));
        assert!(backend.inactive_source(&handle()).is_none());
    }

    #[tokio::test]
    async fn activation_refuses_locked_object() {
        let backend = MockBackend::new();
        backend.seed_object(&handle(), "old");
        backend
            .request(
                RequestSpec::post("classes/zcl_demo")
                    .query("action", "lock")
                    .query("accessMode", "modify"),
            )
            .await
            .unwrap();

        let activation = backend
            .request(RequestSpec::post("activation").body(
                "application/json",
                serde_json::json!({"uri": "classes/zcl_demo"}).to_string(),
            ))
            .await;
        assert!(matches!(activation, Err(BackendError::Conflict(_))));
    }

    #[tokio::test]
    async fn check_reports_marker_as_error_message() {
        let backend = MockBackend::new();
        let check = RequestSpec::post("classes/zcl_demo/checkruns")
            .query("version", "inactive")
            .body("text/plain; charset=utf-8", "has a syntax-error inside");
        let response = backend.request(check).await.unwrap();
        let messages = response.json().unwrap()["messages"].clone();
        assert_eq!(messages[0]["type"], "E");
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let backend = MockBackend::new();
        backend.seed_object(&handle(), "src");
        backend.fail_once(MockOp::Read, BackendError::Transport("timeout".into()));

        let first = backend.request(RequestSpec::get("classes/zcl_demo")).await;
        assert!(matches!(first, Err(BackendError::Transport(_))));

        let second = backend.request(RequestSpec::get("classes/zcl_demo")).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let backend = MockBackend::new();
        backend.seed_object(&handle(), "src");
        backend
            .request(RequestSpec::get("classes/zcl_demo"))
            .await
            .unwrap();
        let _ = backend
            .request(
                RequestSpec::post("classes/zcl_demo")
                    .query("action", "lock")
                    .query("accessMode", "modify"),
            )
            .await;

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].op, MockOp::Read);
        assert_eq!(calls[1].op, MockOp::Lock);
    }

    #[test]
    fn reset_reverts_to_stateless_and_counts() {
        let backend = MockBackend::new();
        backend.set_session_mode(SessionMode::Stateful);
        backend.reset();
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
        assert_eq!(backend.reset_count(), 1);
    }
}
