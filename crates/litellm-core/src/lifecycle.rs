//! # Record Lifecycle
//!
//! Explicit lifecycle state of a desired record, derived from its metadata
//! and status instead of being inferred from finalizer presence.
//!
//! ## State Derivation
//! ```text
//! ┌──────────────────────┬──────────────────┬───────────────────────────┐
//! │ deletion requested   │ remote id known  │ state                     │
//! ├──────────────────────┼──────────────────┼───────────────────────────┤
//! │ no                   │ no               │ NoRemote                  │
//! │ no                   │ yes              │ RemotePresent             │
//! │ yes                  │ any              │ DeletionInProgress        │
//! └──────────────────────┴──────────────────┴───────────────────────────┘
//! ```
//!
//! ## Two-Phase Delete
//! ```text
//! DeletionInProgress
//!     │
//!     ├── finalizer absent ───────────────► Skip (no remote action, ever)
//!     │
//!     ├── remote id known ────────────────► DeleteById
//!     │
//!     └── remote id unknown ──────────────► DeleteByNaturalKey
//!                                           (only if the entity is owned)
//!
//! remote delete ok / not found ──► remove finalizer ──► record disappears
//! remote delete failed          ──► keep finalizer  ──► retry
//! ```

use serde::{Deserialize, Serialize};

use crate::types::RecordMeta;

// =============================================================================
// Lifecycle State
// =============================================================================

/// Where a record stands with respect to its remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No remote entity is known yet.
    NoRemote,
    /// A remote id has been recorded.
    RemotePresent,
    /// Deletion has been requested.
    DeletionInProgress,
}

impl LifecycleState {
    /// Derives the state.
    pub fn derive(deletion_requested: bool, remote_id_known: bool) -> Self {
        match (deletion_requested, remote_id_known) {
            (true, _) => LifecycleState::DeletionInProgress,
            (false, true) => LifecycleState::RemotePresent,
            (false, false) => LifecycleState::NoRemote,
        }
    }

    /// Whether a pass in this state may create a remote entity.
    pub fn may_create(&self) -> bool {
        matches!(self, LifecycleState::NoRemote)
    }
}

// =============================================================================
// Deletion Plan
// =============================================================================

/// What the first phase of deletion has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionPlan {
    /// The finalizer is gone; nothing remote may be touched.
    Skip,
    /// Delete the recorded remote entity.
    DeleteById(String),
    /// No id was recorded; look the entity up and delete it only if owned.
    DeleteByNaturalKey,
}

impl DeletionPlan {
    /// Plans deletion for a record whose deletion has been requested.
    pub fn plan(meta: &RecordMeta, finalizer: &str, remote_id: Option<&str>) -> Self {
        if !meta.has_finalizer(finalizer) {
            return DeletionPlan::Skip;
        }
        match remote_id {
            Some(id) if !id.is_empty() => DeletionPlan::DeleteById(id.to_string()),
            _ => DeletionPlan::DeleteByNaturalKey,
        }
    }
}

// =============================================================================
// Finalizer List Helpers
// =============================================================================

/// Adds a finalizer. Returns `true` if it was not already present.
pub fn add_finalizer(finalizers: &mut Vec<String>, finalizer: &str) -> bool {
    if finalizers.iter().any(|f| f == finalizer) {
        return false;
    }
    finalizers.push(finalizer.to_string());
    true
}

/// Removes a finalizer. Returns `true` if it was present.
pub fn remove_finalizer(finalizers: &mut Vec<String>, finalizer: &str) -> bool {
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    finalizers.len() != before
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FIN: &str = "teams.auth.litellm.ai/finalizer";

    #[test]
    fn test_derive_state() {
        assert_eq!(LifecycleState::derive(false, false), LifecycleState::NoRemote);
        assert_eq!(
            LifecycleState::derive(false, true),
            LifecycleState::RemotePresent
        );
        assert_eq!(
            LifecycleState::derive(true, false),
            LifecycleState::DeletionInProgress
        );
        assert_eq!(
            LifecycleState::derive(true, true),
            LifecycleState::DeletionInProgress
        );
    }

    #[test]
    fn test_deleting_record_never_creates() {
        assert!(!LifecycleState::derive(true, false).may_create());
        assert!(LifecycleState::derive(false, false).may_create());
    }

    #[test]
    fn test_plan_without_finalizer_skips() {
        let meta = RecordMeta::default();
        assert_eq!(
            DeletionPlan::plan(&meta, FIN, Some("team-1")),
            DeletionPlan::Skip
        );
    }

    #[test]
    fn test_plan_with_finalizer() {
        let meta = RecordMeta {
            finalizers: vec![FIN.to_string()],
            ..Default::default()
        };
        assert_eq!(
            DeletionPlan::plan(&meta, FIN, Some("team-1")),
            DeletionPlan::DeleteById("team-1".to_string())
        );
        assert_eq!(
            DeletionPlan::plan(&meta, FIN, None),
            DeletionPlan::DeleteByNaturalKey
        );
        assert_eq!(
            DeletionPlan::plan(&meta, FIN, Some("")),
            DeletionPlan::DeleteByNaturalKey
        );
    }

    #[test]
    fn test_finalizer_helpers() {
        let mut list = vec!["other".to_string()];
        assert!(add_finalizer(&mut list, FIN));
        assert!(!add_finalizer(&mut list, FIN));
        assert_eq!(list.len(), 2);
        assert!(remove_finalizer(&mut list, FIN));
        assert!(!remove_finalizer(&mut list, FIN));
        assert_eq!(list, vec!["other".to_string()]);
    }
}
