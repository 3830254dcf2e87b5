//! # Team Membership
//!
//! Association of a user with a team, with a role and an optional per-team
//! budget.
//!
//! ```text
//! spec.teamAlias ──/team/list──► team_id ─┐
//!                                         ├──► remote id "<team_id>:<user_id>"
//! spec.userEmail ──/user/list──► user_id ─┘
//! ```
//!
//! Memberships carry no metadata, so ownership of a found membership cannot
//! be decided; it is adopted.

use serde::{Deserialize, Serialize};

use crate::budget::Budget;
use crate::diff::{Diff, DiffReport, FieldRule};
use crate::error::{SpecError, SpecResult};
use crate::types::ConnectionRef;
use crate::validation::{require, validate_email};

/// Roles a team member can hold.
pub const MEMBER_ROLES: &[&str] = &["user", "admin"];

fn default_role() -> String {
    "user".to_string()
}

// =============================================================================
// Desired Spec
// =============================================================================

/// Desired membership of a user in a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSpec {
    pub connection_ref: ConnectionRef,

    /// Immutable after creation.
    pub team_alias: String,

    /// Immutable after creation.
    pub user_email: String,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default)]
    pub max_budget_in_team: Option<String>,
}

impl MembershipSpec {
    /// Projects the spec into a membership request.
    ///
    /// The team and user ids are resolved against the gateway later.
    pub fn to_request(&self) -> SpecResult<MembershipRequest> {
        let team_alias = require("teamAlias", &self.team_alias)?.to_string();
        let user_email = validate_email("userEmail", &self.user_email)?.to_string();

        let role = self.role.trim().to_string();
        if !MEMBER_ROLES.contains(&role.as_str()) {
            return Err(SpecError::invalid(
                "role",
                format!("unknown role '{}'", role),
            ));
        }

        Ok(MembershipRequest {
            team_alias,
            user_email,
            role,
            max_budget_in_team: Budget::parse_optional(
                "maxBudgetInTeam",
                self.max_budget_in_team.as_deref(),
            )?,
        })
    }
}

// =============================================================================
// Desired Request
// =============================================================================

/// Projected membership, keyed by natural identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipRequest {
    pub team_alias: String,
    pub user_email: String,
    pub role: String,
    pub max_budget_in_team: Option<Budget>,
}

impl MembershipRequest {
    /// Returns the `teamAlias/userEmail` natural key.
    pub fn natural_key(&self) -> String {
        format!("{}/{}", self.team_alias, self.user_email)
    }
}

// =============================================================================
// Remote View
// =============================================================================

/// A membership assembled from the team's member list and budget table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteMembership {
    pub team_id: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub role: Option<String>,
    pub max_budget_in_team: Option<f64>,
    pub spend: Option<f64>,
}

impl RemoteMembership {
    /// Returns the composite remote id.
    pub fn remote_id(&self) -> String {
        membership_id(&self.team_id, &self.user_id)
    }
}

/// Builds the composite id `<team_id>:<user_id>`.
pub fn membership_id(team_id: &str, user_id: &str) -> String {
    format!("{}:{}", team_id, user_id)
}

/// Splits a composite id back into `(team_id, user_id)`.
///
/// ## Example
/// ```rust
/// use litellm_core::kinds::membership::split_membership_id;
///
/// assert_eq!(split_membership_id("t-1:u-1"), Some(("t-1", "u-1")));
/// assert_eq!(split_membership_id("t-1"), None);
/// ```
pub fn split_membership_id(id: &str) -> Option<(&str, &str)> {
    match id.split_once(':') {
        Some((team, user)) if !team.is_empty() && !user.is_empty() => Some((team, user)),
        _ => None,
    }
}

// =============================================================================
// Field Table
// =============================================================================

pub const ROLE: FieldRule = FieldRule::equate_empty("role");
pub const MAX_BUDGET_IN_TEAM: FieldRule = FieldRule::equate_empty("max_budget_in_team");

/// Every compared membership field.
pub const FIELDS: &[FieldRule] = &[ROLE, MAX_BUDGET_IN_TEAM];

/// Compares the remote membership with the desired request.
pub fn diff(remote: &RemoteMembership, desired: &MembershipRequest) -> DiffReport {
    Diff::new()
        .check(ROLE, &remote.role, &Some(desired.role.clone()))
        .check(
            MAX_BUDGET_IN_TEAM,
            &remote.max_budget_in_team,
            &desired.max_budget_in_team.map(f64::from),
        )
        .finish()
}

// =============================================================================
// Observed Status
// =============================================================================

/// Membership fields mirrored into status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MembershipObserved {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
}

pub fn observe(remote: &RemoteMembership) -> MembershipObserved {
    MembershipObserved {
        team_id: Some(remote.team_id.clone()),
        user_id: Some(remote.user_id.clone()),
        spend: remote.spend,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(role: &str) -> MembershipSpec {
        serde_json::from_value(json!({
            "connectionRef": { "secretRef": { "name": "gw" } },
            "teamAlias": "eng",
            "userEmail": "alice@example.com",
            "role": role,
        }))
        .unwrap()
    }

    #[test]
    fn test_request() {
        let request = spec("admin").to_request().unwrap();
        assert_eq!(request.natural_key(), "eng/alice@example.com");
        assert_eq!(request.role, "admin");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(spec("owner").to_request().is_err());
    }

    #[test]
    fn test_ids() {
        assert_eq!(membership_id("t", "u"), "t:u");
        assert_eq!(split_membership_id(":u"), None);
    }

    #[test]
    fn test_diff_role() {
        let request = spec("admin").to_request().unwrap();
        let remote = RemoteMembership {
            team_id: "t".to_string(),
            user_id: "u".to_string(),
            role: Some("user".to_string()),
            ..Default::default()
        };
        let report = diff(&remote, &request);
        assert_eq!(report.changed_fields(), vec!["role"]);
    }
}
