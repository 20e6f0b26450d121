//! engine::manifest
//!
//! Bulk-apply manifest loading.
//!
//! Two wire schemas share one in-memory model:
//!
//! - `"flat"` - an `objects` array; each record names its prerequisites
//!   explicitly via `dependsOn`.
//! - `"tree"` - a nested `root` record mirroring a container hierarchy;
//!   children implicitly depend on their parent, and sources arrive as
//!   base64 `payload` blobs. Records marked `restoreStatus:
//!   "not-implemented"` are carried for reporting but excluded from
//!   execution.
//!
//! Both parse into [`Manifest`], which hands the scheduler a
//! [`DependencyNode`] per entry and keeps a sha256 fingerprint of the raw
//! bytes for reporting.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::types::{DependencyNode, ObjectHandle, ObjectKind, ObjectName, TypeError};

/// Errors from manifest loading.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Could not read the manifest file.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The manifest is not valid JSON for either schema.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// A record's kind or name is invalid.
    #[error("invalid object in record '{id}': {source}")]
    InvalidObject {
        /// Record id
        id: String,
        /// Validation failure
        source: TypeError,
    },

    /// A tree record's payload is not valid base64 UTF-8.
    #[error("invalid payload in record '{id}': {message}")]
    Payload {
        /// Record id
        id: String,
        /// What went wrong
        message: String,
    },

    /// Two records share an id.
    #[error("duplicate record id '{0}'")]
    DuplicateId(String),
}

/// Whether a tree record can be materialized by this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreStatus {
    /// The record is executable.
    #[default]
    Ok,
    /// The record's kind has no restore path yet; report, do not execute.
    NotImplemented,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "schema", rename_all = "lowercase")]
enum RawManifest {
    Flat {
        objects: Vec<FlatRecord>,
    },
    Tree {
        root: TreeRecord,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FlatRecord {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TreeRecord {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    config: serde_json::Value,
    /// Base64-encoded source body.
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    restore_status: RestoreStatus,
    #[serde(default)]
    children: Vec<TreeRecord>,
}

/// One executable manifest record.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Record id, unique within the manifest.
    pub id: String,
    /// The object the record describes.
    pub handle: ObjectHandle,
    /// Kind-specific creation config, passed through to the backend.
    pub config: serde_json::Value,
    /// Source body to push via update, if the record carries one.
    pub source: Option<String>,
    /// Ids this record must run after.
    pub depends_on: BTreeSet<String>,
}

/// A record carried for reporting but excluded from execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    /// Record id.
    pub id: String,
    /// Object kind, as spelled in the manifest.
    pub kind: String,
    /// Why it is excluded.
    pub reason: String,
}

/// A parsed, validated bulk-apply manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    skipped: Vec<SkippedEntry>,
    fingerprint: String,
}

impl Manifest {
    /// Load and parse a manifest file.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse a manifest from raw JSON.
    pub fn from_json(raw: &str) -> Result<Self, ManifestError> {
        let fingerprint = hex::encode(Sha256::digest(raw.as_bytes()));
        let parsed: RawManifest = serde_json::from_str(raw)?;

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        match parsed {
            RawManifest::Flat { objects } => {
                for record in objects {
                    entries.push(flat_entry(record)?);
                }
            }
            RawManifest::Tree { root } => {
                flatten_tree(root, None, &mut entries, &mut skipped)?;
            }
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.clone()) {
                return Err(ManifestError::DuplicateId(entry.id.clone()));
            }
        }

        Ok(Self {
            entries,
            skipped,
            fingerprint,
        })
    }

    /// Executable records, in manifest order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Look up one record by id.
    pub fn entry(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Records excluded from execution.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Hex sha256 of the raw manifest bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Scheduler input: one node per executable record.
    pub fn nodes(&self) -> Vec<DependencyNode> {
        self.entries
            .iter()
            .map(|e| DependencyNode {
                id: e.id.clone(),
                kind: e.handle.kind,
                depends_on: e.depends_on.clone(),
            })
            .collect()
    }
}

fn parse_handle(
    id: &str,
    kind: &str,
    name: &str,
    variant: Option<String>,
) -> Result<ObjectHandle, ManifestError> {
    let invalid = |source| ManifestError::InvalidObject {
        id: id.to_string(),
        source,
    };
    let kind = ObjectKind::parse(kind).map_err(invalid)?;
    let name = ObjectName::new(name).map_err(invalid)?;
    Ok(match variant {
        Some(v) => ObjectHandle::with_variant(kind, name, v),
        None => ObjectHandle::new(kind, name),
    })
}

fn flat_entry(record: FlatRecord) -> Result<ManifestEntry, ManifestError> {
    let handle = parse_handle(&record.id, &record.kind, &record.name, record.variant)?;
    Ok(ManifestEntry {
        id: record.id,
        handle,
        config: record.config,
        source: record.source,
        depends_on: record.depends_on.into_iter().collect(),
    })
}

/// Depth-first flatten. Children depend on their parent; grandchildren on
/// their own parent, transitively ordering the whole subtree.
fn flatten_tree(
    record: TreeRecord,
    parent: Option<&str>,
    entries: &mut Vec<ManifestEntry>,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<(), ManifestError> {
    let TreeRecord {
        id,
        kind,
        name,
        variant,
        config,
        payload,
        restore_status,
        children,
    } = record;

    // A skipped parent still orders its children: they inherit its parent
    // as their dependency instead.
    let child_parent: Option<String> = if restore_status == RestoreStatus::NotImplemented {
        skipped.push(SkippedEntry {
            id: id.clone(),
            kind,
            reason: "restore not implemented for this kind".to_string(),
        });
        parent.map(str::to_string)
    } else {
        let handle = parse_handle(&id, &kind, &name, variant)?;
        let source = payload
            .map(|p| decode_payload(&id, &p))
            .transpose()?;
        let mut depends_on = BTreeSet::new();
        if let Some(parent_id) = parent {
            depends_on.insert(parent_id.to_string());
        }
        entries.push(ManifestEntry {
            id: id.clone(),
            handle,
            config,
            source,
            depends_on,
        });
        Some(id)
    };

    for child in children {
        flatten_tree(child, child_parent.as_deref(), entries, skipped)?;
    }
    Ok(())
}

fn decode_payload(id: &str, payload: &str) -> Result<String, ManifestError> {
    let bytes = BASE64.decode(payload).map_err(|e| ManifestError::Payload {
        id: id.to_string(),
        message: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| ManifestError::Payload {
        id: id.to_string(),
        message: e.to_string(),
    })
}
