//! # In-Memory Control Plane
//!
//! A [`ControlPlane`] kept entirely in memory, with the semantics the
//! reconcile engine relies on:
//!
//! - every write bumps the resource version; stale writes are `Conflict`
//! - spec changes bump `generation`, status writes do not
//! - a record under deletion is removed once its last finalizer is gone
//! - removing a record deletes the secrets it owns
//!
//! Spec changes and deletion requests are announced on a broadcast channel,
//! the way a watch stream would.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::{PlaneError, PlaneResult};
use crate::plane::ControlPlane;
use crate::record::RawRecord;
use crate::secret::{NewSecret, Secret};
use litellm_core::{ObjectKey, RecordMeta, ResourceKind, Sensitive};

/// Capacity of the change notification channel.
const EVENT_CAPACITY: usize = 1024;

/// A change notification: the spec of a record changed, or its deletion
/// was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneEvent {
    pub kind: ResourceKind,
    pub key: ObjectKey,
}

#[derive(Default)]
struct State {
    records: BTreeMap<(&'static str, ObjectKey), RawRecord>,
    secrets: BTreeMap<ObjectKey, Secret>,
    version: u64,
    status_writes: usize,
    reject_secret_creates: bool,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn check_version(
        record: &RawRecord,
        kind: ResourceKind,
        expected: Option<&str>,
    ) -> PlaneResult<()> {
        match expected {
            Some(v) if record.meta.resource_version.as_deref() != Some(v) => {
                Err(PlaneError::conflict(kind.kind, record.key()))
            }
            _ => Ok(()),
        }
    }

    fn remove_record(&mut self, kind: ResourceKind, key: &ObjectKey) {
        if let Some(record) = self.records.remove(&(kind.kind, key.clone())) {
            let uid = record.meta.uid;
            self.secrets
                .retain(|_, s| s.owner_uid.as_deref() != Some(uid.as_str()));
            debug!(kind = kind.kind, key = %key, "record removed");
        }
    }
}

/// In-memory control plane for tests and local runs.
#[derive(Clone)]
pub struct MemoryControlPlane {
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<PlaneEvent>,
}

impl Default for MemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryControlPlane {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        MemoryControlPlane {
            state: Arc::new(RwLock::new(State::default())),
            events,
        }
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaneEvent> {
        self.events.subscribe()
    }

    fn notify(&self, kind: ResourceKind, key: ObjectKey) {
        // No subscribers is fine.
        let _ = self.events.send(PlaneEvent { kind, key });
    }

    // =========================================================================
    // Authoring (what a user or admission layer would do)
    // =========================================================================

    /// Creates a record or replaces its spec.
    pub async fn apply(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        spec: Value,
    ) -> RawRecord {
        let key = ObjectKey::new(namespace, name);
        let mut state = self.state.write().await;
        let version = state.next_version();

        let record = state
            .records
            .entry((kind.kind, key.clone()))
            .and_modify(|r| {
                if r.spec != spec {
                    r.spec = spec.clone();
                    r.meta.generation += 1;
                }
                r.meta.resource_version = Some(version.clone());
            })
            .or_insert_with(|| RawRecord {
                meta: RecordMeta {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    uid: Uuid::new_v4().to_string(),
                    generation: 1,
                    resource_version: Some(version.clone()),
                    deletion_requested: false,
                    finalizers: Vec::new(),
                },
                spec: spec.clone(),
                status: Value::Null,
            })
            .clone();
        drop(state);

        self.notify(kind, key);
        record
    }

    /// Seeds a status document without version checks.
    pub async fn seed_status(&self, kind: ResourceKind, key: &ObjectKey, status: Value) {
        let mut state = self.state.write().await;
        let version = state.next_version();
        if let Some(record) = state.records.get_mut(&(kind.kind, key.clone())) {
            record.status = status;
            record.meta.resource_version = Some(version);
        }
    }

    /// Requests deletion. Records without finalizers disappear immediately.
    pub async fn request_delete(&self, kind: ResourceKind, key: &ObjectKey) -> PlaneResult<()> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        let record = state
            .records
            .get_mut(&(kind.kind, key.clone()))
            .ok_or_else(|| PlaneError::not_found(kind.kind, key))?;

        if record.meta.finalizers.is_empty() {
            state.remove_record(kind, key);
        } else {
            record.meta.deletion_requested = true;
            record.meta.resource_version = Some(version);
        }
        drop(state);

        self.notify(kind, key.clone());
        Ok(())
    }

    /// Stores a secret directly (e.g. a connection secret).
    pub async fn put_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let secret = Secret {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), Sensitive::new(*v)))
                .collect(),
            owner_uid: None,
        };
        self.state
            .write()
            .await
            .secrets
            .insert(secret.key(), secret);
    }

    /// Deletes a secret directly.
    pub async fn delete_secret(&self, key: &ObjectKey) {
        self.state.write().await.secrets.remove(key);
    }

    /// Makes every following `create_secret` fail until reset.
    pub async fn reject_secret_creates(&self, reject: bool) {
        self.state.write().await.reject_secret_creates = reject;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns a record, if present.
    pub async fn record(&self, kind: ResourceKind, key: &ObjectKey) -> Option<RawRecord> {
        self.state
            .read()
            .await
            .records
            .get(&(kind.kind, key.clone()))
            .cloned()
    }

    /// Returns a secret, if present.
    pub async fn secret(&self, key: &ObjectKey) -> Option<Secret> {
        self.state.read().await.secrets.get(key).cloned()
    }

    /// Number of status writes accepted so far.
    pub async fn status_writes(&self) -> usize {
        self.state.read().await.status_writes
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> PlaneResult<Option<RawRecord>> {
        Ok(self.record(kind, key).await)
    }

    async fn set_finalizers(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
        finalizers: Vec<String>,
        resource_version: Option<&str>,
    ) -> PlaneResult<Option<RawRecord>> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        let record = state
            .records
            .get_mut(&(kind.kind, key.clone()))
            .ok_or_else(|| PlaneError::not_found(kind.kind, key))?;
        State::check_version(record, kind, resource_version)?;

        if record.meta.deletion_requested && finalizers.is_empty() {
            state.remove_record(kind, key);
            return Ok(None);
        }

        record.meta.finalizers = finalizers;
        record.meta.resource_version = Some(version);
        Ok(Some(record.clone()))
    }

    async fn write_status(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
        status: Value,
        resource_version: Option<&str>,
    ) -> PlaneResult<RawRecord> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        let record = state
            .records
            .get_mut(&(kind.kind, key.clone()))
            .ok_or_else(|| PlaneError::not_found(kind.kind, key))?;
        State::check_version(record, kind, resource_version)?;

        record.status = status;
        record.meta.resource_version = Some(version);
        let record = record.clone();
        state.status_writes += 1;
        Ok(record)
    }

    async fn get_secret(&self, key: &ObjectKey) -> PlaneResult<Option<Secret>> {
        Ok(self.secret(key).await)
    }

    async fn create_secret(&self, secret: NewSecret) -> PlaneResult<()> {
        let mut state = self.state.write().await;
        let key = ObjectKey::new(&secret.namespace, &secret.name);

        if state.reject_secret_creates {
            return Err(PlaneError::Unavailable(format!(
                "secret {} could not be written",
                key
            )));
        }
        if state.secrets.contains_key(&key) {
            return Err(PlaneError::AlreadyExists {
                kind: "Secret".to_string(),
                key: key.to_string(),
            });
        }

        state.secrets.insert(
            key,
            Secret {
                namespace: secret.namespace,
                name: secret.name,
                data: secret.data,
                owner_uid: Some(secret.owner.uid),
            },
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::OwnerRef;
    use litellm_core::types::{API_KEY, TEAM};
    use serde_json::json;

    fn key() -> ObjectKey {
        ObjectKey::new("ml", "eng")
    }

    #[tokio::test]
    async fn test_apply_bumps_generation_only_on_spec_change() {
        let plane = MemoryControlPlane::new();
        let first = plane.apply(TEAM, "ml", "eng", json!({ "a": 1 })).await;
        assert_eq!(first.meta.generation, 1);

        let same = plane.apply(TEAM, "ml", "eng", json!({ "a": 1 })).await;
        assert_eq!(same.meta.generation, 1);
        assert_eq!(same.meta.uid, first.meta.uid);

        let changed = plane.apply(TEAM, "ml", "eng", json!({ "a": 2 })).await;
        assert_eq!(changed.meta.generation, 2);
    }

    #[tokio::test]
    async fn test_stale_status_write_conflicts() {
        let plane = MemoryControlPlane::new();
        let record = plane.apply(TEAM, "ml", "eng", json!({})).await;
        let rv = record.meta.resource_version.clone();

        plane
            .write_status(TEAM, &key(), json!({ "x": 1 }), rv.as_deref())
            .await
            .unwrap();
        let err = plane
            .write_status(TEAM, &key(), json!({ "x": 2 }), rv.as_deref())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(plane.status_writes().await, 1);
    }

    #[tokio::test]
    async fn test_delete_without_finalizer_is_immediate() {
        let plane = MemoryControlPlane::new();
        plane.apply(TEAM, "ml", "eng", json!({})).await;
        plane.request_delete(TEAM, &key()).await.unwrap();
        assert!(plane.record(TEAM, &key()).await.is_none());
    }

    #[tokio::test]
    async fn test_finalizer_holds_deletion_and_cascades_secrets() {
        let plane = MemoryControlPlane::new();
        let record = plane.apply(API_KEY, "ml", "eng", json!({})).await;
        plane
            .set_finalizers(API_KEY, &key(), vec!["f".to_string()], None)
            .await
            .unwrap();
        plane
            .create_secret(NewSecret {
                namespace: "ml".to_string(),
                name: "gw-key-eng".to_string(),
                data: BTreeMap::new(),
                owner: OwnerRef::to_record(API_KEY, "eng", &record.meta.uid),
            })
            .await
            .unwrap();

        plane.request_delete(API_KEY, &key()).await.unwrap();
        let pending = plane.record(API_KEY, &key()).await.unwrap();
        assert!(pending.meta.deletion_requested);

        let gone = plane
            .set_finalizers(API_KEY, &key(), vec![], None)
            .await
            .unwrap();
        assert!(gone.is_none());
        assert!(plane.record(API_KEY, &key()).await.is_none());
        assert!(plane
            .secret(&ObjectKey::new("ml", "gw-key-eng"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_secret_create_rules() {
        let plane = MemoryControlPlane::new();
        plane.put_secret("ml", "taken", &[("k", "v")]).await;

        let new = |name: &str| NewSecret {
            namespace: "ml".to_string(),
            name: name.to_string(),
            data: BTreeMap::new(),
            owner: OwnerRef::to_record(API_KEY, "eng", "uid"),
        };

        assert!(matches!(
            plane.create_secret(new("taken")).await,
            Err(PlaneError::AlreadyExists { .. })
        ));

        plane.reject_secret_creates(true).await;
        assert!(plane.create_secret(new("fresh")).await.is_err());
        plane.reject_secret_creates(false).await;
        assert!(plane.create_secret(new("fresh")).await.is_ok());
    }

    #[tokio::test]
    async fn test_events_on_apply_and_delete() {
        let plane = MemoryControlPlane::new();
        let mut events = plane.subscribe();

        plane.apply(TEAM, "ml", "eng", json!({})).await;
        plane.request_delete(TEAM, &key()).await.unwrap();

        assert_eq!(events.recv().await.unwrap().key, key());
        assert_eq!(events.recv().await.unwrap().kind, TEAM);
    }
}
