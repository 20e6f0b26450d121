//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ObjectKind`] - Development-object type with a fixed scheduling priority
//! - [`ObjectName`] - Validated object name
//! - [`ObjectHandle`] - Identity of one remote object `(kind, name, variant)`
//! - [`LifecycleState`] - Current state of a lifecycle controller
//! - [`Step`] - One named lifecycle operation
//! - [`LockToken`] - Backend-issued exclusive edit token
//! - [`OperationResult`] - Immutable snapshot of one step's backend response
//! - [`ErrorLog`] - Append-only per-chain error record
//! - [`DependencyNode`] - Scheduler input record
//!
//! # Validation
//!
//! `ObjectName` enforces validity at construction time, so malformed names
//! cannot reach the wire layer.
//!
//! # Examples
//!
//! ```
//! use stagehand::core::types::{ObjectHandle, ObjectKind, ObjectName};
//!
//! let name = ObjectName::new("zcl_demo").unwrap();
//! let handle = ObjectHandle::new(ObjectKind::Class, name);
//! assert_eq!(handle.to_string(), "class/zcl_demo");
//!
//! assert!(ObjectName::new("").is_err());
//! assert!(ObjectName::new("has space").is_err());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object name: {0}")]
    InvalidObjectName(String),

    #[error("unknown object kind: {0}")]
    UnknownObjectKind(String),
}

/// Development-object kind.
///
/// The variant set is fixed: the backend exposes a closed catalog of
/// editable object types. Each kind carries a scheduling priority
/// ([`ObjectKind::priority`]) and the URL collection segment used by the
/// generic wire strategy ([`ObjectKind::segment`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Package - structural container for other objects.
    Package,
    /// Function group - container for function modules.
    FunctionGroup,
    /// Domain - elementary dictionary type.
    Domain,
    /// Data element - dictionary type built on a domain.
    DataElement,
    /// Database table definition.
    Table,
    /// View over one or more tables.
    View,
    /// Service definition - projection exposing views as a service.
    ServiceDefinition,
    /// Service binding - binds a service definition to a protocol.
    ServiceBinding,
    /// Interface - code contract.
    Interface,
    /// Class - leaf code object.
    Class,
    /// Program - standalone leaf code object.
    Program,
}

impl ObjectKind {
    /// All kinds, in priority order.
    pub const ALL: [ObjectKind; 11] = [
        ObjectKind::Package,
        ObjectKind::FunctionGroup,
        ObjectKind::Domain,
        ObjectKind::DataElement,
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::ServiceDefinition,
        ObjectKind::ServiceBinding,
        ObjectKind::Interface,
        ObjectKind::Class,
        ObjectKind::Program,
    ];

    /// Scheduling priority: a fixed total order over kinds.
    ///
    /// Containers and structural types come first so they exist before the
    /// objects that reference them; leaf code objects come last. Lower is
    /// earlier.
    pub fn priority(self) -> u8 {
        match self {
            ObjectKind::Package => 0,
            ObjectKind::FunctionGroup => 1,
            ObjectKind::Domain => 2,
            ObjectKind::DataElement => 3,
            ObjectKind::Table => 4,
            ObjectKind::View => 5,
            ObjectKind::ServiceDefinition => 6,
            ObjectKind::ServiceBinding => 7,
            ObjectKind::Interface => 8,
            ObjectKind::Class => 9,
            ObjectKind::Program => 10,
        }
    }

    /// URL collection segment for this kind.
    pub fn segment(self) -> &'static str {
        match self {
            ObjectKind::Package => "packages",
            ObjectKind::FunctionGroup => "functiongroups",
            ObjectKind::Domain => "domains",
            ObjectKind::DataElement => "dataelements",
            ObjectKind::Table => "tables",
            ObjectKind::View => "views",
            ObjectKind::ServiceDefinition => "servicedefinitions",
            ObjectKind::ServiceBinding => "servicebindings",
            ObjectKind::Interface => "interfaces",
            ObjectKind::Class => "classes",
            ObjectKind::Program => "programs",
        }
    }

    /// Parse a kind from its manifest spelling (kebab-case).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "package" => Ok(ObjectKind::Package),
            "function-group" => Ok(ObjectKind::FunctionGroup),
            "domain" => Ok(ObjectKind::Domain),
            "data-element" => Ok(ObjectKind::DataElement),
            "table" => Ok(ObjectKind::Table),
            "view" => Ok(ObjectKind::View),
            "service-definition" => Ok(ObjectKind::ServiceDefinition),
            "service-binding" => Ok(ObjectKind::ServiceBinding),
            "interface" => Ok(ObjectKind::Interface),
            "class" => Ok(ObjectKind::Class),
            "program" => Ok(ObjectKind::Program),
            other => Err(TypeError::UnknownObjectKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Package => "package",
            ObjectKind::FunctionGroup => "function-group",
            ObjectKind::Domain => "domain",
            ObjectKind::DataElement => "data-element",
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::ServiceDefinition => "service-definition",
            ObjectKind::ServiceBinding => "service-binding",
            ObjectKind::Interface => "interface",
            ObjectKind::Class => "class",
            ObjectKind::Program => "program",
        };
        write!(f, "{}", s)
    }
}

/// A validated development-object name.
///
/// Names must:
/// - Be non-empty and at most 120 characters
/// - Contain only alphanumerics, `_`, `-`, `.`, and `/`
/// - Not start or end with `/`
///
/// # Example
///
/// ```
/// use stagehand::core::types::ObjectName;
///
/// let name = ObjectName::new("zcl_order_api").unwrap();
/// assert_eq!(name.as_str(), "zcl_order_api");
///
/// assert!(ObjectName::new("").is_err());
/// assert!(ObjectName::new("/leading").is_err());
/// assert!(ObjectName::new("no spaces").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName(String);

impl ObjectName {
    /// Create a new validated object name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidObjectName` if the name violates the rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidObjectName("name cannot be empty".into()));
        }
        if name.len() > 120 {
            return Err(TypeError::InvalidObjectName(
                "name cannot exceed 120 characters".into(),
            ));
        }
        if name.starts_with('/') || name.ends_with('/') {
            return Err(TypeError::InvalidObjectName(
                "name cannot start or end with '/'".into(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.' | '/'))
        {
            return Err(TypeError::InvalidObjectName(format!(
                "name contains invalid character '{}'",
                c
            )));
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectName> for String {
    fn from(value: ObjectName) -> Self {
        value.0
    }
}

/// Identity of one remote development object.
///
/// Identity is the full `(kind, name, variant)` triple. The variant
/// disambiguates composite keys, e.g. a sub-object owned by a parent
/// container (a function module inside a function group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    /// Object kind.
    pub kind: ObjectKind,
    /// Object name.
    pub name: ObjectName,
    /// Optional variant key for composite identities.
    pub variant: Option<String>,
}

impl ObjectHandle {
    /// Create a handle without a variant key.
    pub fn new(kind: ObjectKind, name: ObjectName) -> Self {
        Self {
            kind,
            name,
            variant: None,
        }
    }

    /// Create a handle with a variant key.
    pub fn with_variant(kind: ObjectKind, name: ObjectName, variant: impl Into<String>) -> Self {
        Self {
            kind,
            name,
            variant: Some(variant.into()),
        }
    }

    /// Resource path of this object relative to the backend root.
    pub fn path(&self) -> String {
        match &self.variant {
            Some(v) => format!("{}/{}/{}", self.kind.segment(), self.name, v),
            None => format!("{}/{}", self.kind.segment(), self.name),
        }
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(v) => write!(f, "{}/{}#{}", self.kind, self.name, v),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Current state of a lifecycle controller.
///
/// The happy path is `Unvalidated → Validated → Created → Locked → Updated
/// → Checked → Unlocked → Activated`. `Checked` is reachable from `Locked`
/// (inactive version) or `Unlocked` (active version). Any state can
/// transition to `Failed` on an unrecoverable error; `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Unvalidated,
    Validated,
    Created,
    Locked,
    Updated,
    Checked,
    Unlocked,
    Activated,
    Deleted,
    Failed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Unvalidated => "unvalidated",
            LifecycleState::Validated => "validated",
            LifecycleState::Created => "created",
            LifecycleState::Locked => "locked",
            LifecycleState::Updated => "updated",
            LifecycleState::Checked => "checked",
            LifecycleState::Unlocked => "unlocked",
            LifecycleState::Activated => "activated",
            LifecycleState::Deleted => "deleted",
            LifecycleState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One named lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Validate,
    Create,
    Lock,
    Update,
    Check,
    Unlock,
    Activate,
    Delete,
    Read,
    ReadMetadata,
    ReadTransport,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Validate => "validate",
            Step::Create => "create",
            Step::Lock => "lock",
            Step::Update => "update",
            Step::Check => "check",
            Step::Unlock => "unlock",
            Step::Activate => "activate",
            Step::Delete => "delete",
            Step::Read => "read",
            Step::ReadMetadata => "read_metadata",
            Step::ReadTransport => "read_transport",
        };
        write!(f, "{}", s)
    }
}

/// Which stored version of an object a read or check targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectVersion {
    /// The staged draft produced by `update`.
    Inactive,
    /// The live version produced by `activate`.
    Active,
}

impl std::fmt::Display for ObjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectVersion::Inactive => write!(f, "inactive"),
            ObjectVersion::Active => write!(f, "active"),
        }
    }
}

/// Backend-issued exclusive edit token.
///
/// Opaque; owned exclusively by the controller instance that acquired it.
/// Never shared across objects or sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken(String);

impl LockToken {
    /// Wrap a backend-issued token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable snapshot of one step's backend response.
///
/// Stored under the step that produced it so later steps and tests can
/// inspect prior outcomes without re-querying the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// HTTP-level status of the backend response.
    pub status: u16,
    /// Decoded response payload.
    pub data: serde_json::Value,
    /// When the result was recorded.
    pub timestamp: DateTime<Utc>,
}

impl OperationResult {
    /// Record a result with the current timestamp.
    pub fn now(status: u16, data: serde_json::Value) -> Self {
        Self {
            status,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// One recorded failure within a lifecycle chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// The step that failed.
    pub step: Step,
    /// Rendered error message.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-chain-execution error record.
///
/// Entries persist across failed steps within one chain; only a fresh
/// `validate()` clears the log. Cleanup code commonly inspects the log
/// post-mortem because it cannot assume which step failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry stamped with the current time.
    pub fn record(&mut self, step: Step, error: impl std::fmt::Display) {
        self.entries.push(ErrorEntry {
            step,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Clear the log. Called only by `validate()`.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All recorded entries, oldest first.
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Whether any failure has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Scheduler input record: one object plus its declared prerequisites.
///
/// Dependency data is advisory metadata from the manifest, not a hard
/// contract from the backend; the scheduler tolerates dangling ids and
/// cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Unique id within one scheduling run.
    pub id: String,
    /// Object kind, used for priority tie-breaks.
    pub kind: ObjectKind,
    /// Ids this node depends on.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl DependencyNode {
    /// Create a node with no dependencies.
    pub fn new(id: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            kind,
            depends_on: BTreeSet::new(),
        }
    }

    /// Add a dependency edge.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }
}
