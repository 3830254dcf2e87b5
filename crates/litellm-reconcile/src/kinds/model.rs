//! Model registration adapter.
//!
//! Models are registered with `model_info.id` set to the record's uid, so the
//! natural key and the remote id coincide and a lookup by natural key is a
//! lookup by id. The provider credential is read from `apiKeySecretRef` at
//! projection time; the gateway redacts it, so it is never diffed.

use async_trait::async_trait;

use crate::adapter::{Created, EntityAdapter, RecordOf};
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::{update_body, GatewayClient};
use litellm_core::kinds::model::{
    self, ModelObserved, ModelRequest, ModelSpec, RemoteModel, RemoteModelInfo, RemoteModelParams,
};
use litellm_core::types::MODEL;
use litellm_core::{ConnectionRef, DiffReport, ObjectKey, Ownership, ResourceKind, Sensitive};
use litellm_plane::ControlPlane;

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelAdapter;

impl ModelAdapter {
    /// Reads the provider credential referenced by the spec.
    async fn provider_key(
        &self,
        plane: &dyn ControlPlane,
        record: &RecordOf<Self>,
    ) -> ReconcileResult<Option<Sensitive>> {
        let Some(secret_ref) = &record.spec.litellm_params.api_key_secret_ref else {
            return Ok(None);
        };

        let key = ObjectKey::new(&record.meta.namespace, &secret_ref.name);
        let secret = plane
            .get_secret(&key)
            .await?
            .ok_or_else(|| ReconcileError::Connection(format!("provider secret {} not found", key)))?;

        secret
            .value(&secret_ref.key)
            .filter(|v| !v.expose().is_empty())
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                ReconcileError::Connection(format!(
                    "provider secret {} has no key '{}'",
                    key, secret_ref.key
                ))
            })
    }
}

#[async_trait]
impl EntityAdapter for ModelAdapter {
    type Spec = ModelSpec;
    type Request = ModelRequest;
    type Remote = RemoteModel;
    type Observed = ModelObserved;

    const KIND: ResourceKind = MODEL;

    fn connection_ref(spec: &ModelSpec) -> &ConnectionRef {
        &spec.connection_ref
    }

    fn natural_key(spec: &ModelSpec) -> String {
        spec.model_name.trim().to_string()
    }

    async fn project(&self, plane: &dyn ControlPlane, record: &RecordOf<Self>) -> ReconcileResult<ModelRequest> {
        let api_key = self.provider_key(plane, record).await?;
        Ok(record.spec.to_request(&record.meta.uid, api_key)?)
    }

    async fn get(&self, gw: &GatewayClient, id: &str) -> ReconcileResult<Option<RemoteModel>> {
        gw.models().get(id).await.map_err(ReconcileError::gateway("get model"))
    }

    async fn find(&self, gw: &GatewayClient, _spec: &ModelSpec, uid: &str) -> ReconcileResult<Option<RemoteModel>> {
        self.get(gw, uid).await
    }

    fn remote_id(remote: &RemoteModel) -> String {
        remote.id().to_string()
    }

    fn ownership(remote: &RemoteModel, uid: &str) -> Ownership {
        remote.ownership(uid)
    }

    async fn create(&self, gw: &GatewayClient, request: &ModelRequest) -> ReconcileResult<Created<RemoteModel>> {
        gw.models()
            .create(request)
            .await
            .map_err(ReconcileError::gateway("create model"))?;

        Ok(Created::without_key(RemoteModel {
            model_name: Some(request.model_name.clone()),
            litellm_params: RemoteModelParams {
                model: Some(request.litellm_params.model.clone()),
                ..Default::default()
            },
            model_info: RemoteModelInfo {
                id: Some(request.model_info.id.clone()),
                db_model: Some(true),
                ..Default::default()
            },
        }))
    }

    fn diff(remote: &RemoteModel, request: &ModelRequest) -> DiffReport {
        model::diff(remote, request)
    }

    async fn update(
        &self,
        gw: &GatewayClient,
        _remote: &RemoteModel,
        request: &ModelRequest,
        report: &DiffReport,
    ) -> ReconcileResult<()> {
        let body = update_body(request, None, &report.cleared_fields())
            .map_err(ReconcileError::gateway("update model"))?;
        gw.models().update(&body).await.map_err(ReconcileError::gateway("update model"))
    }

    async fn delete(&self, gw: &GatewayClient, id: &str) -> ReconcileResult<()> {
        gw.models().delete(id).await.map_err(ReconcileError::gateway("delete model"))
    }

    fn observe(remote: &RemoteModel) -> ModelObserved {
        model::observe(remote)
    }
}
