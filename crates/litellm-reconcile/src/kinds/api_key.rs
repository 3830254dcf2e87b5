//! API key adapter.
//!
//! Natural key: `keyAlias`. Remote id: the token hash the gateway reports
//! for the key. The key itself is returned only by `/key/generate` and
//! `/key/regenerate`; it is written to `<base>-key-<alias>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{Created, EntityAdapter, RecordOf, Reissued};
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::{update_body, GatewayClient};
use litellm_core::kinds::api_key::{self, ApiKeyObserved, ApiKeyRequest, ApiKeySpec, RemoteApiKey};
use litellm_core::naming::{key_secret_name, secret_base};
use litellm_core::types::API_KEY;
use litellm_core::{ConnectionRef, ConnectionSource, DiffReport, Ownership, ResourceKind};
use litellm_plane::ControlPlane;

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiKeyAdapter;

#[async_trait]
impl EntityAdapter for ApiKeyAdapter {
    type Spec = ApiKeySpec;
    type Request = ApiKeyRequest;
    type Remote = RemoteApiKey;
    type Observed = ApiKeyObserved;

    const KIND: ResourceKind = API_KEY;

    fn connection_ref(spec: &ApiKeySpec) -> &ConnectionRef {
        &spec.connection_ref
    }

    fn natural_key(spec: &ApiKeySpec) -> String {
        spec.key_alias.trim().to_string()
    }

    async fn project(&self, _plane: &dyn ControlPlane, record: &RecordOf<Self>) -> ReconcileResult<ApiKeyRequest> {
        Ok(record.spec.to_request(&record.meta.uid)?)
    }

    async fn get(&self, gw: &GatewayClient, token: &str) -> ReconcileResult<Option<RemoteApiKey>> {
        gw.keys().get(token).await.map_err(ReconcileError::gateway("get key"))
    }

    async fn find(&self, gw: &GatewayClient, spec: &ApiKeySpec, _uid: &str) -> ReconcileResult<Option<RemoteApiKey>> {
        gw.keys()
            .find_by_alias(&Self::natural_key(spec))
            .await
            .map_err(ReconcileError::gateway("list keys"))
    }

    fn remote_id(remote: &RemoteApiKey) -> String {
        remote.token.clone()
    }

    fn ownership(remote: &RemoteApiKey, uid: &str) -> Ownership {
        remote.ownership(uid)
    }

    async fn create(&self, gw: &GatewayClient, request: &ApiKeyRequest) -> ReconcileResult<Created<RemoteApiKey>> {
        let issued = gw
            .keys()
            .generate(request)
            .await
            .map_err(ReconcileError::gateway("generate key"))?;
        Ok(Created {
            remote: issued.remote,
            key_material: Some(issued.key),
        })
    }

    fn diff(remote: &RemoteApiKey, request: &ApiKeyRequest) -> DiffReport {
        api_key::diff(remote, request)
    }

    async fn update(
        &self,
        gw: &GatewayClient,
        remote: &RemoteApiKey,
        request: &ApiKeyRequest,
        report: &DiffReport,
    ) -> ReconcileResult<()> {
        let mut body = update_body(request, Some(("key", &remote.token)), &report.cleared_fields())
            .map_err(ReconcileError::gateway("update key"))?;
        // `duration` is relative to now; re-sending it would extend the expiry.
        if let Value::Object(fields) = &mut body {
            fields.remove("duration");
        }
        gw.keys().update(&body).await.map_err(ReconcileError::gateway("update key"))
    }

    async fn delete(&self, gw: &GatewayClient, token: &str) -> ReconcileResult<()> {
        gw.keys().delete(token).await.map_err(ReconcileError::gateway("delete key"))
    }

    fn observe(remote: &RemoteApiKey) -> ApiKeyObserved {
        api_key::observe(remote)
    }

    fn key_secret(spec: &ApiKeySpec, source: &ConnectionSource) -> Option<String> {
        Some(key_secret_name(secret_base(source), &Self::natural_key(spec)))
    }

    async fn reissue(&self, gw: &GatewayClient, remote: &RemoteApiKey, _uid: &str) -> ReconcileResult<Reissued> {
        let issued = gw
            .keys()
            .regenerate(&remote.token)
            .await
            .map_err(ReconcileError::gateway("regenerate key"))?;

        let token = issued.remote.token;
        Ok(Reissued {
            key_material: issued.key,
            remote_id: (!token.is_empty() && token != remote.token).then_some(token),
        })
    }
}
