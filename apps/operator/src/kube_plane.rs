//! # Kubernetes Control Plane
//!
//! [`ControlPlane`] over the Kubernetes API. Records are custom resources read
//! as [`DynamicObject`]s; secrets are core `Secret`s.
//!
//! ```text
//! ControlPlane            Kubernetes call
//! ─────────────────────   ─────────────────────────────────────────────────
//! get                     GET  <plural>/<name>
//! set_finalizers          PATCH (merge) metadata.finalizers + resourceVersion
//! write_status            PATCH (merge) status subresource + resourceVersion
//! get_secret              GET  secrets/<name>
//! create_secret           POST secrets, ownerReference to the record
//! ```
//!
//! Carrying `resourceVersion` in a merge patch makes the API server reject
//! the write with 409 when the object changed since it was read.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret as KubeSecret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use litellm_core::{ObjectKey, RecordMeta, ResourceKind, Sensitive};
use litellm_plane::{ControlPlane, NewSecret, PlaneError, PlaneResult, RawRecord, Secret};

const SECRET_KIND: &str = "Secret";

/// Control plane backed by a Kubernetes cluster.
#[derive(Clone)]
pub struct KubePlane {
    client: Client,
}

impl KubePlane {
    pub fn new(client: Client) -> Self {
        KubePlane { client }
    }

    /// API for one record kind in one namespace.
    fn records(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind))
    }

    fn secrets(&self, namespace: &str) -> Api<KubeSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// API resource descriptor of a record kind.
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group, kind.version, kind.kind);
    ApiResource::from_gvk_with_plural(&gvk, kind.plural)
}

// =============================================================================
// Conversion
// =============================================================================

/// Converts a custom resource into a raw record.
pub fn to_raw(kind: ResourceKind, object: DynamicObject) -> PlaneResult<RawRecord> {
    let meta = object.metadata;
    let name = meta.name.unwrap_or_default();
    let namespace = meta.namespace.unwrap_or_default();
    let uid = meta.uid.ok_or_else(|| PlaneError::Invalid {
        kind: kind.kind.to_string(),
        key: format!("{}/{}", namespace, name),
        reason: "object has no uid".to_string(),
    })?;

    let mut data = object.data;
    let spec = data.get_mut("spec").map(Value::take).unwrap_or(Value::Null);
    let status = data.get_mut("status").map(Value::take).unwrap_or(Value::Null);

    Ok(RawRecord {
        meta: RecordMeta {
            name,
            namespace,
            uid,
            generation: meta.generation.unwrap_or_default(),
            resource_version: meta.resource_version,
            deletion_requested: meta.deletion_timestamp.is_some(),
            finalizers: meta.finalizers.unwrap_or_default(),
        },
        spec,
        status,
    })
}

fn to_secret(secret: KubeSecret) -> Secret {
    let owner_uid = secret.metadata.owner_references.as_ref().and_then(|refs| {
        refs.iter()
            .find(|r| r.controller == Some(true))
            .or_else(|| refs.first())
            .map(|r| r.uid.clone())
    });

    let data = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, Sensitive::new(String::from_utf8_lossy(&v.0).into_owned())))
        .chain(
            secret
                .string_data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, Sensitive::new(v))),
        )
        .collect();

    Secret {
        namespace: secret.metadata.namespace.unwrap_or_default(),
        name: secret.metadata.name.unwrap_or_default(),
        data,
        owner_uid,
    }
}

/// Merge patch replacing `previous` with `next`: keys that disappeared are
/// set to `null` so the API server drops them.
pub fn status_patch(previous: &Value, next: &Value) -> Value {
    let mut patch = match next {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Value::Object(old) = previous {
        for key in old.keys() {
            patch.entry(key.clone()).or_insert(Value::Null);
        }
    }
    Value::Object(patch)
}

fn map_error(kind: &str, key: &ObjectKey, err: kube::Error) -> PlaneError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => PlaneError::not_found(kind, key),
            409 if response.reason == "AlreadyExists" => PlaneError::AlreadyExists {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            409 => PlaneError::conflict(kind, key),
            429 | 500..=599 => PlaneError::Unavailable(response.message),
            _ => PlaneError::Rejected(format!("{} {}: {}", kind, key, response.message)),
        },
        other => PlaneError::Unavailable(other.to_string()),
    }
}

// =============================================================================
// ControlPlane Implementation
// =============================================================================

#[async_trait]
impl ControlPlane for KubePlane {
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> PlaneResult<Option<RawRecord>> {
        let object = self
            .records(kind, &key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| map_error(kind.kind, key, e))?;

        object.map(|o| to_raw(kind, o)).transpose()
    }

    async fn set_finalizers(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
        finalizers: Vec<String>,
        resource_version: Option<&str>,
    ) -> PlaneResult<Option<RawRecord>> {
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource_version,
            }
        });

        let result = self
            .records(kind, &key.namespace)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await;

        match result {
            Ok(object) => {
                let record = to_raw(kind, object)?;
                // The API server removes the object once the last finalizer is gone.
                if record.meta.deletion_requested && record.meta.finalizers.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(record))
                }
            }
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(None),
            Err(e) => Err(map_error(kind.kind, key, e)),
        }
    }

    async fn write_status(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
        status: Value,
        resource_version: Option<&str>,
    ) -> PlaneResult<RawRecord> {
        let api = self.records(kind, &key.namespace);
        let previous = self
            .get(kind, key)
            .await?
            .ok_or_else(|| PlaneError::not_found(kind.kind, key))?
            .status;

        let patch = json!({
            "metadata": { "resourceVersion": resource_version },
            "status": status_patch(&previous, &status),
        });

        let object = api
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_error(kind.kind, key, e))?;
        to_raw(kind, object)
    }

    async fn get_secret(&self, key: &ObjectKey) -> PlaneResult<Option<Secret>> {
        let secret = self
            .secrets(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| map_error(SECRET_KIND, key, e))?;
        Ok(secret.map(to_secret))
    }

    async fn create_secret(&self, secret: NewSecret) -> PlaneResult<()> {
        let key = ObjectKey::new(&secret.namespace, &secret.name);
        let data: BTreeMap<String, ByteString> = secret
            .data
            .iter()
            .map(|(k, v)| (k.clone(), ByteString(v.expose().as_bytes().to_vec())))
            .collect();

        let object = KubeSecret {
            metadata: ObjectMeta {
                name: Some(secret.name.clone()),
                namespace: Some(secret.namespace.clone()),
                owner_references: Some(vec![OwnerReference {
                    api_version: secret.owner.api_version.clone(),
                    kind: secret.owner.kind.clone(),
                    name: secret.owner.name.clone(),
                    uid: secret.owner.uid.clone(),
                    controller: Some(true),
                    block_owner_deletion: Some(true),
                }]),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        };

        self.secrets(&secret.namespace)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| map_error(SECRET_KIND, &key, e))?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use litellm_core::types::{MODEL, TEAM};

    fn object(data: Value) -> DynamicObject {
        let mut object = DynamicObject::new("eng", &api_resource(TEAM)).within("ml");
        object.metadata.uid = Some("uid-1".to_string());
        object.metadata.generation = Some(3);
        object.metadata.resource_version = Some("42".to_string());
        object.data = data;
        object
    }

    #[test]
    fn test_api_resource() {
        let ar = api_resource(MODEL);
        assert_eq!(ar.api_version, "litellm.litellm.ai/v1alpha1");
        assert_eq!(ar.plural, "models");
    }

    #[test]
    fn test_to_raw_splits_spec_and_status() {
        let raw = to_raw(
            TEAM,
            object(json!({ "spec": { "teamAlias": "eng" }, "status": { "remoteId": "t-1" } })),
        )
        .unwrap();

        assert_eq!(raw.key(), ObjectKey::new("ml", "eng"));
        assert_eq!(raw.meta.uid, "uid-1");
        assert_eq!(raw.meta.generation, 3);
        assert_eq!(raw.meta.resource_version.as_deref(), Some("42"));
        assert!(!raw.meta.deletion_requested);
        assert_eq!(raw.spec["teamAlias"], "eng");
        assert_eq!(raw.status["remoteId"], "t-1");
    }

    #[test]
    fn test_to_raw_without_status() {
        let raw = to_raw(TEAM, object(json!({ "spec": {} }))).unwrap();
        assert!(raw.status.is_null());
    }

    #[test]
    fn test_to_raw_requires_uid() {
        let mut o = object(json!({}));
        o.metadata.uid = None;
        assert!(matches!(to_raw(TEAM, o), Err(PlaneError::Invalid { .. })));
    }

    #[test]
    fn test_status_patch_nulls_removed_keys() {
        let previous = json!({ "remoteId": "t-1", "spend": 1.5, "conditions": [] });
        let next = json!({ "remoteId": "t-1", "conditions": [] });

        let patch = status_patch(&previous, &next);
        assert_eq!(patch["remoteId"], "t-1");
        assert!(patch["spend"].is_null());
        assert!(patch.as_object().unwrap().contains_key("spend"));
    }

    #[test]
    fn test_secret_owner_and_data() {
        let secret = KubeSecret {
            metadata: ObjectMeta {
                name: Some("gw-key-ci".to_string()),
                namespace: Some("ml".to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "auth.litellm.ai/v1alpha1".to_string(),
                    kind: "VirtualKey".to_string(),
                    name: "ci".to_string(),
                    uid: "uid-1".to_string(),
                    controller: Some(true),
                    block_owner_deletion: None,
                }]),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "key".to_string(),
                ByteString(b"sk-1".to_vec()),
            )])),
            ..Default::default()
        };

        let secret = to_secret(secret);
        assert_eq!(secret.owner_uid.as_deref(), Some("uid-1"));
        assert_eq!(secret.value("key").unwrap().expose(), "sk-1");
    }
}
