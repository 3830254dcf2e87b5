//! # Control-Plane Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Kubernetes API error / in-memory rule violation                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PlaneError (this module) ← Adds kind/key context and categorization    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReconcileError::Plane ← stale writes retried, missing secrets mapped   │
//! │                          to ConnectionError by the caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Control-plane operation errors.
#[derive(Debug, Error)]
pub enum PlaneError {
    /// The object does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },

    /// A write carried a stale resource version.
    ///
    /// ## When This Occurs
    /// - Another writer updated the record between our read and our write
    /// - The record was re-created under the same name
    #[error("{kind} {key} was modified concurrently")]
    Conflict { kind: String, key: String },

    /// Create of an object whose name is taken.
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: String, key: String },

    /// The stored document does not have the expected shape.
    #[error("invalid {kind} document {key}: {reason}")]
    Invalid {
        kind: String,
        key: String,
        reason: String,
    },

    /// The control plane could not be reached or timed out.
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// The control plane refused the request.
    #[error("control plane rejected request: {0}")]
    Rejected(String),
}

impl PlaneError {
    /// Creates a NotFound error.
    pub fn not_found(kind: impl Into<String>, key: impl ToString) -> Self {
        PlaneError::NotFound {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(kind: impl Into<String>, key: impl ToString) -> Self {
        PlaneError::Conflict {
            kind: kind.into(),
            key: key.to_string(),
        }
    }

    /// Returns true if the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlaneError::NotFound { .. })
    }

    /// Returns true if a write lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PlaneError::Conflict { .. })
    }

    /// Returns true if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlaneError::Conflict { .. } | PlaneError::Unavailable(_) | PlaneError::NotFound { .. }
        )
    }
}

/// Convenience type alias for Results with PlaneError.
pub type PlaneResult<T> = Result<T, PlaneError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = PlaneError::conflict("Team", "ml/eng");
        assert!(err.is_conflict());
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Team ml/eng was modified concurrently");

        let err = PlaneError::Rejected("forbidden".to_string());
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }
}
