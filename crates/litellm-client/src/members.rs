//! # Team Members API
//!
//! | call     | endpoint                                                    |
//! |----------|-------------------------------------------------------------|
//! | add      | `POST /team/member_add {team_id, member, max_budget_in_team}` |
//! | update   | `POST /team/member_update`                                  |
//! | delete   | `POST /team/member_delete {team_id, user_id}`               |
//! | get      | composed from `GET /team/info?team_id=`                     |
//!
//! The gateway has no membership entity of its own. A membership is read by
//! joining the team's `members_with_roles` (role) with its membership rows
//! (per-team budget and spend).

use serde::Serialize;

use crate::client::{gone, GatewayClient};
use crate::error::GatewayResult;
use litellm_core::kinds::membership::RemoteMembership;
use litellm_core::Budget;

/// Desired membership, with gateway ids already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberWrite {
    pub team_id: String,
    pub user_id: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget_in_team: Option<Budget>,
}

#[derive(Serialize)]
struct MemberAddBody<'a> {
    team_id: &'a str,
    member: Member<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_budget_in_team: Option<Budget>,
}

#[derive(Serialize)]
struct Member<'a> {
    user_id: &'a str,
    role: &'a str,
}

#[derive(Serialize)]
struct MemberDeleteBody<'a> {
    team_id: &'a str,
    user_id: &'a str,
}

/// Team member operations.
pub struct Members<'a> {
    client: &'a GatewayClient,
}

impl GatewayClient {
    pub fn members(&self) -> Members<'_> {
        Members { client: self }
    }
}

impl Members<'_> {
    pub async fn add(&self, write: &MemberWrite) -> GatewayResult<()> {
        let body = MemberAddBody {
            team_id: &write.team_id,
            member: Member {
                user_id: &write.user_id,
                role: &write.role,
            },
            max_budget_in_team: write.max_budget_in_team,
        };
        self.client.post_unit("/team/member_add", &body).await
    }

    /// Updates role and per-team budget. A cleared budget is sent as `null`.
    pub async fn update(&self, write: &MemberWrite) -> GatewayResult<()> {
        let body = serde_json::json!({
            "team_id": write.team_id,
            "user_id": write.user_id,
            "role": write.role,
            "max_budget_in_team": write.max_budget_in_team,
        });
        self.client.post_unit("/team/member_update", &body).await
    }

    /// Removes a member. A missing team or member is not an error.
    pub async fn delete(&self, team_id: &str, user_id: &str) -> GatewayResult<()> {
        gone(
            self.client
                .post_unit("/team/member_delete", &MemberDeleteBody { team_id, user_id })
                .await,
        )
    }

    /// Reads one membership. `None` if the team or the member is absent.
    pub async fn get(&self, team_id: &str, user_id: &str) -> GatewayResult<Option<RemoteMembership>> {
        let Some(info) = self.client.teams().info(team_id).await? else {
            return Ok(None);
        };

        let Some(member) = info.team.member(user_id) else {
            return Ok(None);
        };

        let row = info
            .memberships
            .iter()
            .find(|m| m.user_id.as_deref() == Some(user_id));

        Ok(Some(RemoteMembership {
            team_id: info.team.team_id.clone(),
            user_id: user_id.to_string(),
            user_email: member.user_email.clone(),
            role: member.role.clone(),
            max_budget_in_team: row
                .and_then(|r| r.litellm_budget_table.as_ref())
                .and_then(|b| b.max_budget),
            spend: row.and_then(|r| r.spend),
        }))
    }
}
