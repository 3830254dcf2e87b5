//! # Teams API
//!
//! | call            | endpoint                           |
//! |-----------------|------------------------------------|
//! | create          | `POST /team/new`                   |
//! | update          | `POST /team/update`                |
//! | delete          | `POST /team/delete {team_ids}`     |
//! | get             | `GET /team/info?team_id=`          |
//! | find_by_alias   | `GET /team/list` + alias filter    |

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{found, gone, GatewayClient};
use crate::error::GatewayResult;
use litellm_core::kinds::team::{RemoteTeam, TeamRequest};

/// A team together with its per-member budget rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamInfo {
    pub team: RemoteTeam,
    pub memberships: Vec<TeamMembershipRow>,
}

/// One row of a team's membership table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TeamMembershipRow {
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    pub spend: Option<f64>,
    pub litellm_budget_table: Option<BudgetRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BudgetRow {
    pub max_budget: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TeamInfoResponse {
    team_id: Option<String>,
    team_info: Option<RemoteTeam>,
    team_memberships: Option<Vec<TeamMembershipRow>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TeamListResponse {
    Page { teams: Vec<RemoteTeam> },
    List(Vec<RemoteTeam>),
}

/// Team operations.
pub struct Teams<'a> {
    client: &'a GatewayClient,
}

impl GatewayClient {
    pub fn teams(&self) -> Teams<'_> {
        Teams { client: self }
    }
}

impl Teams<'_> {
    pub async fn create(&self, request: &TeamRequest) -> GatewayResult<RemoteTeam> {
        self.client.post_json("/team/new", request).await
    }

    /// Applies an update body built by [`update_body`](crate::update_body).
    pub async fn update(&self, body: &Value) -> GatewayResult<()> {
        self.client.post_unit("/team/update", body).await
    }

    /// Deletes a team. An already-absent team is not an error.
    pub async fn delete(&self, team_id: &str) -> GatewayResult<()> {
        gone(
            self.client
                .post_unit("/team/delete", &json!({ "team_ids": [team_id] }))
                .await,
        )
    }

    /// Reads a team by id, including membership rows.
    pub async fn info(&self, team_id: &str) -> GatewayResult<Option<TeamInfo>> {
        let response: Option<TeamInfoResponse> = found(
            self.client
                .get_json("/team/info", &[("team_id", team_id)])
                .await,
        )?;

        Ok(response.and_then(|r| {
            let memberships = r.team_memberships.unwrap_or_default();
            r.team_info.map(|mut team| {
                if team.team_id.is_empty() {
                    team.team_id = r.team_id.unwrap_or_else(|| team_id.to_string());
                }
                TeamInfo { team, memberships }
            })
        }))
    }

    /// Reads a team by id.
    pub async fn get(&self, team_id: &str) -> GatewayResult<Option<RemoteTeam>> {
        Ok(self.info(team_id).await?.map(|i| i.team))
    }

    /// Finds a team by exact alias.
    pub async fn find_by_alias(&self, alias: &str) -> GatewayResult<Option<RemoteTeam>> {
        let response: TeamListResponse = self.client.get_json("/team/list", &[]).await?;
        let teams = match response {
            TeamListResponse::Page { teams } => teams,
            TeamListResponse::List(teams) => teams,
        };
        Ok(teams
            .into_iter()
            .find(|t| t.team_alias.as_deref() == Some(alias)))
    }
}
