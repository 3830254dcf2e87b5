//! # Entity Kinds
//!
//! Per-kind desired spec, projected gateway request, remote view and
//! observed status.
//!
//! ```text
//!   Spec ──to_request()──► Request ──────────────┐
//!   (camelCase,            (gateway JSON)        │
//!    budgets as strings)                         ▼
//!                                             diff() ──► DiffReport
//!   Remote ◄──────── gateway response ───────────┘
//!     │
//!     └──observe()──► Observed (flattened into status)
//! ```
//!
//! Each submodule declares its compared fields as a table of
//! [`FieldRule`](crate::diff::FieldRule) constants.

pub mod account;
pub mod api_key;
pub mod membership;
pub mod model;
pub mod team;

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{SpecError, SpecResult};

/// Metadata key carrying the uid of the record that created a remote entity.
pub const OWNER_MARKER: &str = "litellm-operator/owner-uid";

/// Free-form gateway metadata.
pub type Metadata = BTreeMap<String, Value>;

// =============================================================================
// Ownership
// =============================================================================

/// Relationship between a record and a remote entity found by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by this record.
    Owned,
    /// Created by something else.
    Foreign,
    /// The kind carries no ownership marker.
    Unknown,
}

/// Reads the owner marker from remote metadata.
pub fn ownership_from_metadata(metadata: Option<&Metadata>, uid: &str) -> Ownership {
    match metadata.and_then(|m| m.get(OWNER_MARKER)) {
        Some(Value::String(owner)) if owner == uid => Ownership::Owned,
        _ => Ownership::Foreign,
    }
}

/// Builds request metadata: the user's entries plus the owner marker.
pub fn owned_metadata(user: Option<&BTreeMap<String, String>>, uid: &str) -> Metadata {
    let mut metadata: Metadata = user
        .into_iter()
        .flatten()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    metadata.insert(OWNER_MARKER.to_string(), Value::String(uid.to_string()));
    metadata
}

/// Rejects negative rate limits.
pub(crate) fn non_negative(field: &str, value: Option<i64>) -> SpecResult<Option<i64>> {
    match value {
        Some(v) if v < 0 => Err(SpecError::invalid(field, format!("{} must not be negative", v))),
        other => Ok(other),
    }
}

/// Trims an optional string, mapping blank to `None`.
pub(crate) fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_metadata_adds_marker() {
        let mut user = BTreeMap::new();
        user.insert("cost-center".to_string(), "42".to_string());

        let metadata = owned_metadata(Some(&user), "uid-1");
        assert_eq!(metadata["cost-center"], "42");
        assert_eq!(metadata[OWNER_MARKER], "uid-1");
        assert_eq!(owned_metadata(None, "uid-1").len(), 1);
    }

    #[test]
    fn test_ownership_from_metadata() {
        let metadata = owned_metadata(None, "uid-1");
        assert_eq!(
            ownership_from_metadata(Some(&metadata), "uid-1"),
            Ownership::Owned
        );
        assert_eq!(
            ownership_from_metadata(Some(&metadata), "uid-2"),
            Ownership::Foreign
        );
        assert_eq!(ownership_from_metadata(None, "uid-1"), Ownership::Foreign);
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative("tpmLimit", Some(10)).unwrap(), Some(10));
        assert_eq!(non_negative("tpmLimit", None).unwrap(), None);
        assert!(non_negative("tpmLimit", Some(-1)).is_err());
    }

    #[test]
    fn test_trimmed() {
        assert_eq!(trimmed(&Some("  ".to_string())), None);
        assert_eq!(trimmed(&Some(" a ".to_string())), Some("a".to_string()));
    }
}
