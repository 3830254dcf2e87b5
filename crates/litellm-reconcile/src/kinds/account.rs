//! Account (user) adapter.
//!
//! Natural key: `userEmail`. Remote id: `user_id`. With `autoCreateKey` the
//! key generated alongside the user is written to `<base>-user-<email>`.

use async_trait::async_trait;
use serde_json::json;

use crate::adapter::{Created, EntityAdapter, RecordOf, Reissued};
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::{update_body, GatewayClient};
use litellm_core::kinds::account::{self, AccountObserved, AccountRequest, AccountSpec, RemoteAccount};
use litellm_core::kinds::OWNER_MARKER;
use litellm_core::naming::{secret_base, user_secret_name};
use litellm_core::types::ACCOUNT;
use litellm_core::{ConnectionRef, ConnectionSource, DiffReport, Ownership, ResourceKind};
use litellm_plane::ControlPlane;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountAdapter;

#[async_trait]
impl EntityAdapter for AccountAdapter {
    type Spec = AccountSpec;
    type Request = AccountRequest;
    type Remote = RemoteAccount;
    type Observed = AccountObserved;

    const KIND: ResourceKind = ACCOUNT;

    fn connection_ref(spec: &AccountSpec) -> &ConnectionRef {
        &spec.connection_ref
    }

    fn natural_key(spec: &AccountSpec) -> String {
        spec.user_email.trim().to_string()
    }

    async fn project(&self, _plane: &dyn ControlPlane, record: &RecordOf<Self>) -> ReconcileResult<AccountRequest> {
        Ok(record.spec.to_request(&record.meta.uid)?)
    }

    async fn get(&self, gw: &GatewayClient, user_id: &str) -> ReconcileResult<Option<RemoteAccount>> {
        gw.users().get(user_id).await.map_err(ReconcileError::gateway("get user"))
    }

    async fn find(&self, gw: &GatewayClient, spec: &AccountSpec, _uid: &str) -> ReconcileResult<Option<RemoteAccount>> {
        gw.users()
            .find_by_email(&Self::natural_key(spec))
            .await
            .map_err(ReconcileError::gateway("list users"))
    }

    fn remote_id(remote: &RemoteAccount) -> String {
        remote.user_id.clone()
    }

    fn ownership(remote: &RemoteAccount, uid: &str) -> Ownership {
        remote.ownership(uid)
    }

    async fn create(&self, gw: &GatewayClient, request: &AccountRequest) -> ReconcileResult<Created<RemoteAccount>> {
        let created = gw
            .users()
            .create(request)
            .await
            .map_err(ReconcileError::gateway("create user"))?;
        Ok(Created {
            remote: created.account,
            key_material: created.key.filter(|k| !k.expose().is_empty()),
        })
    }

    fn diff(remote: &RemoteAccount, request: &AccountRequest) -> DiffReport {
        account::diff(remote, request)
    }

    async fn update(
        &self,
        gw: &GatewayClient,
        remote: &RemoteAccount,
        request: &AccountRequest,
        report: &DiffReport,
    ) -> ReconcileResult<()> {
        let body = update_body(request, Some(("user_id", &remote.user_id)), &report.cleared_fields())
            .map_err(ReconcileError::gateway("update user"))?;
        gw.users().update(&body).await.map_err(ReconcileError::gateway("update user"))
    }

    async fn delete(&self, gw: &GatewayClient, user_id: &str) -> ReconcileResult<()> {
        gw.users().delete(user_id).await.map_err(ReconcileError::gateway("delete user"))
    }

    fn observe(remote: &RemoteAccount) -> AccountObserved {
        account::observe(remote)
    }

    fn key_secret(spec: &AccountSpec, source: &ConnectionSource) -> Option<String> {
        spec.auto_create_key
            .then(|| user_secret_name(secret_base(source), &Self::natural_key(spec)))
    }

    /// Generates a fresh key for the user. A previously generated key, if
    /// any, stays valid on the gateway.
    async fn reissue(&self, gw: &GatewayClient, remote: &RemoteAccount, uid: &str) -> ReconcileResult<Reissued> {
        let body = json!({
            "user_id": remote.user_id,
            "metadata": { (OWNER_MARKER): uid },
        });
        let issued = gw
            .keys()
            .generate_raw(&body)
            .await
            .map_err(ReconcileError::gateway("generate user key"))?;
        Ok(Reissued {
            key_material: issued.key,
            remote_id: None,
        })
    }
}
