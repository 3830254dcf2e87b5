//! Team membership adapter.
//!
//! Natural key: `teamAlias/userEmail`. Remote id: `<team_id>:<user_id>`.
//! Both the team and the user must already exist on the gateway before a
//! membership is created; until they do the pass fails with
//! `DependencyMissing` and is retried. A lookup treats a missing team or user
//! as a missing membership, so deletion never waits on them. Memberships
//! carry no owner marker, so one found by natural key is adopted.

use async_trait::async_trait;

use crate::adapter::{Created, EntityAdapter, RecordOf};
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::{GatewayClient, MemberWrite};
use litellm_core::kinds::membership::{
    self, split_membership_id, MembershipObserved, MembershipRequest, MembershipSpec, RemoteMembership,
};
use litellm_core::types::TEAM_MEMBERSHIP;
use litellm_core::{ConnectionRef, DiffReport, Ownership, ResourceKind};
use litellm_plane::ControlPlane;

#[derive(Debug, Clone, Copy, Default)]
pub struct MembershipAdapter;

impl MembershipAdapter {
    /// Looks up `(team_id, user_id)`. The inner error names the missing side.
    async fn lookup_ids(
        &self,
        gw: &GatewayClient,
        team_alias: &str,
        user_email: &str,
    ) -> ReconcileResult<Result<(String, String), String>> {
        let Some(team) = gw
            .teams()
            .find_by_alias(team_alias)
            .await
            .map_err(ReconcileError::gateway("list teams"))?
        else {
            return Ok(Err(format!("team '{}' does not exist", team_alias)));
        };

        let Some(user) = gw
            .users()
            .find_by_email(user_email)
            .await
            .map_err(ReconcileError::gateway("list users"))?
        else {
            return Ok(Err(format!("user '{}' does not exist", user_email)));
        };

        Ok(Ok((team.team_id, user.user_id)))
    }

    fn split(remote_id: &str) -> ReconcileResult<(&str, &str)> {
        split_membership_id(remote_id).ok_or_else(|| ReconcileError::RemoteEntityMissing {
            remote_id: remote_id.to_string(),
        })
    }
}

#[async_trait]
impl EntityAdapter for MembershipAdapter {
    type Spec = MembershipSpec;
    type Request = MembershipRequest;
    type Remote = RemoteMembership;
    type Observed = MembershipObserved;

    const KIND: ResourceKind = TEAM_MEMBERSHIP;

    fn connection_ref(spec: &MembershipSpec) -> &ConnectionRef {
        &spec.connection_ref
    }

    fn natural_key(spec: &MembershipSpec) -> String {
        format!("{}/{}", spec.team_alias.trim(), spec.user_email.trim())
    }

    async fn project(&self, _plane: &dyn ControlPlane, record: &RecordOf<Self>) -> ReconcileResult<MembershipRequest> {
        Ok(record.spec.to_request()?)
    }

    async fn get(&self, gw: &GatewayClient, remote_id: &str) -> ReconcileResult<Option<RemoteMembership>> {
        let (team_id, user_id) = Self::split(remote_id)?;
        gw.members()
            .get(team_id, user_id)
            .await
            .map_err(ReconcileError::gateway("get team member"))
    }

    async fn find(&self, gw: &GatewayClient, spec: &MembershipSpec, _uid: &str) -> ReconcileResult<Option<RemoteMembership>> {
        let ids = self
            .lookup_ids(gw, spec.team_alias.trim(), spec.user_email.trim())
            .await?;
        let Ok((team_id, user_id)) = ids else {
            return Ok(None);
        };
        gw.members()
            .get(&team_id, &user_id)
            .await
            .map_err(ReconcileError::gateway("get team member"))
    }

    fn remote_id(remote: &RemoteMembership) -> String {
        remote.remote_id()
    }

    fn ownership(_remote: &RemoteMembership, _uid: &str) -> Ownership {
        Ownership::Unknown
    }

    async fn create(&self, gw: &GatewayClient, request: &MembershipRequest) -> ReconcileResult<Created<RemoteMembership>> {
        let (team_id, user_id) = self
            .lookup_ids(gw, &request.team_alias, &request.user_email)
            .await?
            .map_err(ReconcileError::DependencyMissing)?;
        let write = MemberWrite {
            team_id,
            user_id,
            role: request.role.clone(),
            max_budget_in_team: request.max_budget_in_team,
        };
        gw.members()
            .add(&write)
            .await
            .map_err(ReconcileError::gateway("add team member"))?;

        Ok(Created::without_key(RemoteMembership {
            team_id: write.team_id,
            user_id: write.user_id,
            user_email: Some(request.user_email.clone()),
            role: Some(write.role),
            max_budget_in_team: write.max_budget_in_team.map(f64::from),
            spend: None,
        }))
    }

    fn diff(remote: &RemoteMembership, request: &MembershipRequest) -> DiffReport {
        membership::diff(remote, request)
    }

    async fn update(
        &self,
        gw: &GatewayClient,
        remote: &RemoteMembership,
        request: &MembershipRequest,
        _report: &DiffReport,
    ) -> ReconcileResult<()> {
        let write = MemberWrite {
            team_id: remote.team_id.clone(),
            user_id: remote.user_id.clone(),
            role: request.role.clone(),
            max_budget_in_team: request.max_budget_in_team,
        };
        gw.members()
            .update(&write)
            .await
            .map_err(ReconcileError::gateway("update team member"))
    }

    async fn delete(&self, gw: &GatewayClient, remote_id: &str) -> ReconcileResult<()> {
        let Some((team_id, user_id)) = split_membership_id(remote_id) else {
            return Ok(());
        };
        gw.members()
            .delete(team_id, user_id)
            .await
            .map_err(ReconcileError::gateway("delete team member"))
    }

    fn observe(remote: &RemoteMembership) -> MembershipObserved {
        membership::observe(remote)
    }
}
