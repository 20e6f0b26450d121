//! lifecycle::strategy
//!
//! Wire strategy: how one lifecycle step becomes one backend request.
//!
//! # Design
//!
//! Object families differ in how their resources are addressed and encoded,
//! but the lifecycle itself is uniform. The [`ObjectStrategy`] trait is the
//! seam: the controller decides *when* to issue a step, the strategy decides
//! *what* the request looks like and how the response is decoded. Family
//! differences become strategy implementations, not controller subclasses.
//!
//! [`GenericStrategy`] is the single shipped implementation: one
//! representative request shape per step, parameterized by the object
//! kind's collection segment. Per-family wire formats are out of scope.

use crate::backend::{BackendError, RequestSpec, ResponseData};
use crate::core::types::{LockToken, ObjectHandle, ObjectVersion, OperationResult, Step};

/// Everything a strategy may need to encode one step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The object the step targets.
    pub handle: &'a ObjectHandle,
    /// Step configuration (creation metadata, delete options, ...).
    pub config: Option<&'a serde_json::Value>,
    /// Source content for `update`, or unsaved content for `check`.
    pub content: Option<&'a str>,
    /// Version selector for `read` and `check`.
    pub version: Option<ObjectVersion>,
    /// Held lock token, for steps that require ownership.
    pub lock_token: Option<&'a LockToken>,
    /// Transport/change-record id attached to mutating steps.
    pub transport: Option<&'a str>,
}

impl<'a> StepContext<'a> {
    /// A context carrying only the object handle.
    pub fn bare(handle: &'a ObjectHandle) -> Self {
        Self {
            handle,
            config: None,
            content: None,
            version: None,
            lock_token: None,
            transport: None,
        }
    }
}

/// Encoding/decoding of lifecycle steps for one object family.
pub trait ObjectStrategy: Send + Sync {
    /// Build the backend request for one step.
    fn encode(&self, step: Step, ctx: &StepContext<'_>) -> RequestSpec;

    /// Decode a successful backend response into an [`OperationResult`].
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the response body cannot be decoded.
    fn decode(&self, step: Step, response: &ResponseData) -> Result<OperationResult, BackendError>;
}

/// Select the strategy for an object kind.
///
/// All kinds currently share [`GenericStrategy`]; this is the seam where a
/// family with a divergent wire shape would get its own implementation.
pub fn strategy_for(handle: &ObjectHandle) -> Box<dyn ObjectStrategy> {
    let _ = handle.kind;
    Box::new(GenericStrategy)
}

/// The representative wire shape shared by all object kinds.
///
/// | step | request |
/// |---|---|
/// | validate | `POST validation?objectType=&name=` with config body |
/// | create | `POST {segment}` with metadata body |
/// | lock | `POST {path}?action=lock&accessMode=modify` |
/// | update | `PUT {path}/source?lockHandle=` with plain-text body |
/// | check | `POST {path}/checkruns?version=` (body only for unsaved content) |
/// | unlock | `POST {path}?action=unlock&lockHandle=` |
/// | activate | `POST activation` with object-reference body |
/// | delete | `DELETE {path}` |
/// | read | `GET {path}/source?version=` |
/// | read_metadata | `GET {path}` |
/// | read_transport | `GET {path}/transport` |
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericStrategy;

impl GenericStrategy {
    fn json_body(value: serde_json::Value) -> (String, String) {
        ("application/json".to_string(), value.to_string())
    }
}

impl ObjectStrategy for GenericStrategy {
    fn encode(&self, step: Step, ctx: &StepContext<'_>) -> RequestSpec {
        let handle = ctx.handle;
        let path = handle.path();
        match step {
            Step::Validate => {
                let body = ctx.config.cloned().unwrap_or(serde_json::json!({}));
                let (content_type, body) = Self::json_body(body);
                RequestSpec::post("validation")
                    .query("objectType", handle.kind.to_string())
                    .query("name", handle.name.to_string())
                    .body(content_type, body)
            }
            Step::Create => {
                let mut body = ctx.config.cloned().unwrap_or(serde_json::json!({}));
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("name".into(), serde_json::json!(handle.name.as_str()));
                }
                let (content_type, body) = Self::json_body(body);
                let mut spec =
                    RequestSpec::post(handle.kind.segment()).body(content_type, body);
                if let Some(transport) = ctx.transport {
                    spec = spec.query("transport", transport);
                }
                spec
            }
            Step::Lock => RequestSpec::post(&path)
                .query("action", "lock")
                .query("accessMode", "modify"),
            Step::Update => {
                let mut spec = RequestSpec::put(format!("{}/source", path)).body(
                    "text/plain; charset=utf-8",
                    ctx.content.unwrap_or_default(),
                );
                if let Some(token) = ctx.lock_token {
                    spec = spec.query("lockHandle", token.as_str());
                }
                if let Some(transport) = ctx.transport {
                    spec = spec.query("transport", transport);
                }
                spec
            }
            Step::Check => {
                let version = ctx.version.unwrap_or(ObjectVersion::Inactive);
                let mut spec = RequestSpec::post(format!("{}/checkruns", path))
                    .query("version", version.to_string());
                if let Some(content) = ctx.content {
                    spec = spec.body("text/plain; charset=utf-8", content);
                }
                spec
            }
            Step::Unlock => {
                let mut spec = RequestSpec::post(&path).query("action", "unlock");
                if let Some(token) = ctx.lock_token {
                    spec = spec.query("lockHandle", token.as_str());
                }
                spec
            }
            Step::Activate => {
                let (content_type, body) = Self::json_body(serde_json::json!({
                    "name": handle.name.as_str(),
                    "uri": path,
                }));
                RequestSpec::post("activation")
                    .query("preauditRequested", "true")
                    .body(content_type, body)
            }
            Step::Delete => {
                let mut spec = RequestSpec::delete(&path);
                if let Some(transport) = ctx.transport {
                    spec = spec.query("transport", transport);
                }
                spec
            }
            Step::Read => {
                let version = ctx.version.unwrap_or(ObjectVersion::Active);
                RequestSpec::get(format!("{}/source", path)).query("version", version.to_string())
            }
            Step::ReadMetadata => RequestSpec::get(&path),
            Step::ReadTransport => RequestSpec::get(format!("{}/transport", path)),
        }
    }

    fn decode(&self, _step: Step, response: &ResponseData) -> Result<OperationResult, BackendError> {
        // Source reads come back as plain text; everything else is JSON.
        let data = match response.header("content-type") {
            Some(ct) if ct.starts_with("text/plain") => serde_json::json!(response.body),
            _ => response.json()?,
        };
        Ok(OperationResult::now(response.status, data))
    }
}
