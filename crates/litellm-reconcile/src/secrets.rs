//! # Generated Key Secrets
//!
//! Key material is returned by the gateway exactly once. It is written to a
//! secret owned by the record, so deleting the record cascades to the secret.
//! Secret names are deterministic (see [`litellm_core::naming`]) so a later
//! pass can re-locate the secret without asking the gateway.

use std::collections::BTreeMap;
use tracing::info;

use crate::error::{ReconcileError, ReconcileResult};
use litellm_core::{ObjectKey, RecordMeta, ResourceKind, Sensitive};
use litellm_plane::{ControlPlane, NewSecret, OwnerRef};

/// Data key holding the key material.
pub const KEY_FIELD: &str = "key";

/// State of a record's key secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretState {
    /// Present, owned by the record, holding key material.
    Present,
    /// Absent.
    Missing,
    /// The name is taken by a secret the record does not own.
    Foreign,
    /// Owned by the record but without key material.
    Empty,
}

/// Inspects the secret `name` in the record's namespace.
pub async fn check(plane: &dyn ControlPlane, meta: &RecordMeta, name: &str) -> ReconcileResult<SecretState> {
    let key = ObjectKey::new(&meta.namespace, name);
    let Some(secret) = plane.get_secret(&key).await? else {
        return Ok(SecretState::Missing);
    };

    if secret.owner_uid.as_deref() != Some(meta.uid.as_str()) {
        return Ok(SecretState::Foreign);
    }
    match secret.value(KEY_FIELD) {
        Some(value) if !value.expose().is_empty() => Ok(SecretState::Present),
        _ => Ok(SecretState::Empty),
    }
}

/// Creates the secret `name` holding `material`, owned by the record.
pub async fn store(
    plane: &dyn ControlPlane,
    kind: ResourceKind,
    meta: &RecordMeta,
    name: &str,
    material: &Sensitive,
) -> ReconcileResult<()> {
    let secret = NewSecret {
        namespace: meta.namespace.clone(),
        name: name.to_string(),
        data: BTreeMap::from([(KEY_FIELD.to_string(), material.clone())]),
        owner: OwnerRef::to_record(kind, &meta.name, &meta.uid),
    };

    plane
        .create_secret(secret)
        .await
        .map_err(|e| ReconcileError::SecretCreateFailed {
            secret: format!("{}/{}", meta.namespace, name),
            reason: e.to_string(),
        })?;

    info!(kind = kind.kind, key = %meta.key(), secret = name, "Stored generated key");
    Ok(())
}

/// The error for a secret that exists but cannot be used.
///
/// `None` for states that are usable or can be repaired by storing.
pub fn unusable(meta: &RecordMeta, name: &str, state: SecretState) -> Option<ReconcileError> {
    let reason = match state {
        SecretState::Present | SecretState::Missing => return None,
        SecretState::Foreign => "a secret with this name exists and is not owned by this record",
        SecretState::Empty => "the secret exists but holds no key material",
    };
    Some(ReconcileError::SecretCreateFailed {
        secret: format!("{}/{}", meta.namespace, name),
        reason: reason.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use litellm_core::types::API_KEY;
    use litellm_plane::MemoryControlPlane;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_and_check() {
        let plane = MemoryControlPlane::new();
        let record = plane.apply(API_KEY, "ml", "ci", json!({})).await;

        assert_eq!(check(&plane, &record.meta, "gw-key-ci").await.unwrap(), SecretState::Missing);

        store(&plane, API_KEY, &record.meta, "gw-key-ci", &Sensitive::new("sk-1"))
            .await
            .unwrap();
        assert_eq!(check(&plane, &record.meta, "gw-key-ci").await.unwrap(), SecretState::Present);

        let secret = plane.secret(&ObjectKey::new("ml", "gw-key-ci")).await.unwrap();
        assert_eq!(secret.value(KEY_FIELD).unwrap().expose(), "sk-1");
        assert_eq!(secret.owner_uid.as_deref(), Some(record.meta.uid.as_str()));
    }

    #[tokio::test]
    async fn test_foreign_secret() {
        let plane = MemoryControlPlane::new();
        let record = plane.apply(API_KEY, "ml", "ci", json!({})).await;
        plane.put_secret("ml", "gw-key-ci", &[("key", "sk-other")]).await;

        let state = check(&plane, &record.meta, "gw-key-ci").await.unwrap();
        assert_eq!(state, SecretState::Foreign);
        assert!(unusable(&record.meta, "gw-key-ci", state).is_some());
        assert!(unusable(&record.meta, "gw-key-ci", SecretState::Missing).is_none());

        let err = store(&plane, API_KEY, &record.meta, "gw-key-ci", &Sensitive::new("sk-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::SecretCreateFailed { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rejected_create() {
        let plane = MemoryControlPlane::new();
        let record = plane.apply(API_KEY, "ml", "ci", json!({})).await;
        plane.reject_secret_creates(true).await;

        let err = store(&plane, API_KEY, &record.meta, "gw-key-ci", &Sensitive::new("sk-1"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), litellm_core::Reason::SecretCreateFailed);
        assert!(!err.to_string().contains("sk-1"));
    }
}
