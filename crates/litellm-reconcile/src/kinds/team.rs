//! Team adapter. Natural key: `teamAlias`. Remote id: `team_id`.

use async_trait::async_trait;

use crate::adapter::{Created, EntityAdapter, RecordOf};
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::{update_body, GatewayClient};
use litellm_core::kinds::team::{self, RemoteTeam, TeamObserved, TeamRequest, TeamSpec};
use litellm_core::types::TEAM;
use litellm_core::{ConnectionRef, DiffReport, Ownership, ResourceKind};
use litellm_plane::ControlPlane;

#[derive(Debug, Clone, Copy, Default)]
pub struct TeamAdapter;

#[async_trait]
impl EntityAdapter for TeamAdapter {
    type Spec = TeamSpec;
    type Request = TeamRequest;
    type Remote = RemoteTeam;
    type Observed = TeamObserved;

    const KIND: ResourceKind = TEAM;

    fn connection_ref(spec: &TeamSpec) -> &ConnectionRef {
        &spec.connection_ref
    }

    fn natural_key(spec: &TeamSpec) -> String {
        spec.team_alias.trim().to_string()
    }

    async fn project(&self, _plane: &dyn ControlPlane, record: &RecordOf<Self>) -> ReconcileResult<TeamRequest> {
        Ok(record.spec.to_request(&record.meta.uid)?)
    }

    async fn get(&self, gw: &GatewayClient, team_id: &str) -> ReconcileResult<Option<RemoteTeam>> {
        gw.teams().get(team_id).await.map_err(ReconcileError::gateway("get team"))
    }

    async fn find(&self, gw: &GatewayClient, spec: &TeamSpec, _uid: &str) -> ReconcileResult<Option<RemoteTeam>> {
        gw.teams()
            .find_by_alias(&Self::natural_key(spec))
            .await
            .map_err(ReconcileError::gateway("list teams"))
    }

    fn remote_id(remote: &RemoteTeam) -> String {
        remote.team_id.clone()
    }

    fn ownership(remote: &RemoteTeam, uid: &str) -> Ownership {
        remote.ownership(uid)
    }

    async fn create(&self, gw: &GatewayClient, request: &TeamRequest) -> ReconcileResult<Created<RemoteTeam>> {
        let remote = gw
            .teams()
            .create(request)
            .await
            .map_err(ReconcileError::gateway("create team"))?;
        Ok(Created::without_key(remote))
    }

    fn diff(remote: &RemoteTeam, request: &TeamRequest) -> DiffReport {
        team::diff(remote, request)
    }

    async fn update(
        &self,
        gw: &GatewayClient,
        remote: &RemoteTeam,
        request: &TeamRequest,
        report: &DiffReport,
    ) -> ReconcileResult<()> {
        let body = update_body(request, Some(("team_id", &remote.team_id)), &report.cleared_fields())
            .map_err(ReconcileError::gateway("update team"))?;
        gw.teams().update(&body).await.map_err(ReconcileError::gateway("update team"))
    }

    async fn delete(&self, gw: &GatewayClient, team_id: &str) -> ReconcileResult<()> {
        gw.teams().delete(team_id).await.map_err(ReconcileError::gateway("delete team"))
    }

    fn observe(remote: &RemoteTeam) -> TeamObserved {
        team::observe(remote)
    }
}
