//! # Team
//!
//! A gateway team: shared budget, rate limits and model allow-list.
//!
//! Natural key: `teamAlias`. Remote id: `team_id`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{non_negative, owned_metadata, ownership_from_metadata, trimmed, Metadata, Ownership};
use crate::budget::Budget;
use crate::diff::{Diff, DiffReport, FieldRule};
use crate::error::SpecResult;
use crate::types::ConnectionRef;
use crate::validation::{require, validate_optional_duration};

// =============================================================================
// Desired Spec
// =============================================================================

/// Desired state of a team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpec {
    pub connection_ref: ConnectionRef,

    /// Immutable after creation.
    pub team_alias: String,

    /// `None` allows every model; `Some([])` allows none.
    #[serde(default)]
    pub models: Option<Vec<String>>,

    #[serde(default)]
    pub max_budget: Option<String>,

    #[serde(default)]
    pub budget_duration: Option<String>,

    #[serde(default)]
    pub tpm_limit: Option<i64>,

    #[serde(default)]
    pub rpm_limit: Option<i64>,

    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub organization_id: Option<String>,

    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl TeamSpec {
    /// Projects the spec into a gateway request.
    pub fn to_request(&self, owner_uid: &str) -> SpecResult<TeamRequest> {
        let team_alias = require("teamAlias", &self.team_alias)?.to_string();
        validate_optional_duration("budgetDuration", self.budget_duration.as_deref())?;

        Ok(TeamRequest {
            team_alias,
            models: self.models.clone(),
            max_budget: Budget::parse_optional("maxBudget", self.max_budget.as_deref())?,
            budget_duration: trimmed(&self.budget_duration),
            tpm_limit: non_negative("tpmLimit", self.tpm_limit)?,
            rpm_limit: non_negative("rpmLimit", self.rpm_limit)?,
            blocked: self.blocked,
            organization_id: trimmed(&self.organization_id),
            metadata: owned_metadata(self.metadata.as_ref(), owner_uid),
        })
    }
}

// =============================================================================
// Gateway Request
// =============================================================================

/// Body of `/team/new` and (with `team_id` added) `/team/update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRequest {
    pub team_alias: String,

    /// Always serialized: `null` and `[]` mean different things.
    pub models: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<Budget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_duration: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpm_limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm_limit: Option<i64>,

    pub blocked: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    pub metadata: Metadata,
}

// =============================================================================
// Remote View
// =============================================================================

/// A team as reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteTeam {
    pub team_id: String,
    pub team_alias: Option<String>,
    pub models: Option<Vec<String>>,
    pub max_budget: Option<f64>,
    pub budget_duration: Option<String>,
    pub budget_reset_at: Option<String>,
    pub tpm_limit: Option<i64>,
    pub rpm_limit: Option<i64>,
    pub blocked: Option<bool>,
    pub organization_id: Option<String>,
    pub metadata: Option<Metadata>,
    pub spend: Option<f64>,
    pub members_with_roles: Option<Vec<TeamMember>>,
}

/// One entry of a team's member list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamMember {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub role: Option<String>,
}

impl RemoteTeam {
    pub fn ownership(&self, uid: &str) -> Ownership {
        ownership_from_metadata(self.metadata.as_ref(), uid)
    }

    /// Finds a member by user id.
    pub fn member(&self, user_id: &str) -> Option<&TeamMember> {
        self.members_with_roles
            .iter()
            .flatten()
            .find(|m| m.user_id.as_deref() == Some(user_id))
    }
}

// =============================================================================
// Field Table
// =============================================================================

pub const TEAM_ALIAS: FieldRule = FieldRule::equate_empty("team_alias").informational();
pub const MODELS: FieldRule = FieldRule::strict("models");
pub const MAX_BUDGET: FieldRule = FieldRule::equate_empty("max_budget");
pub const BUDGET_DURATION: FieldRule = FieldRule::equate_empty("budget_duration");
pub const TPM_LIMIT: FieldRule = FieldRule::equate_empty("tpm_limit");
pub const RPM_LIMIT: FieldRule = FieldRule::equate_empty("rpm_limit");
pub const BLOCKED: FieldRule = FieldRule::equate_empty("blocked");
pub const ORGANIZATION_ID: FieldRule = FieldRule::equate_empty("organization_id");
pub const METADATA: FieldRule = FieldRule::equate_empty("metadata");

/// Every compared team field.
pub const FIELDS: &[FieldRule] = &[
    TEAM_ALIAS,
    MODELS,
    MAX_BUDGET,
    BUDGET_DURATION,
    TPM_LIMIT,
    RPM_LIMIT,
    BLOCKED,
    ORGANIZATION_ID,
    METADATA,
];

/// Compares the remote team with the desired request.
pub fn diff(remote: &RemoteTeam, desired: &TeamRequest) -> DiffReport {
    Diff::new()
        .check(TEAM_ALIAS, &remote.team_alias, &Some(desired.team_alias.clone()))
        .check(MODELS, &remote.models, &desired.models)
        .check(
            MAX_BUDGET,
            &remote.max_budget,
            &desired.max_budget.map(f64::from),
        )
        .check(BUDGET_DURATION, &remote.budget_duration, &desired.budget_duration)
        .check(TPM_LIMIT, &remote.tpm_limit, &desired.tpm_limit)
        .check(RPM_LIMIT, &remote.rpm_limit, &desired.rpm_limit)
        .check(
            BLOCKED,
            &Some(remote.blocked.unwrap_or(false)),
            &Some(desired.blocked),
        )
        .check(ORGANIZATION_ID, &remote.organization_id, &desired.organization_id)
        .check(METADATA, &remote.metadata, &Some(desired.metadata.clone()))
        .finish()
}

// =============================================================================
// Observed Status
// =============================================================================

/// Team fields mirrored into status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamObserved {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_reset_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<usize>,
}

pub fn observe(remote: &RemoteTeam) -> TeamObserved {
    TeamObserved {
        spend: remote.spend,
        max_budget: remote.max_budget,
        budget_reset_at: remote.budget_reset_at.clone(),
        models: remote.models.clone(),
        member_count: remote.members_with_roles.as_ref().map(Vec::len),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(alias: &str, budget: &str) -> TeamSpec {
        serde_json::from_value(json!({
            "connectionRef": { "secretRef": { "name": "gw" } },
            "teamAlias": alias,
            "maxBudget": budget,
        }))
        .unwrap()
    }

    fn remote_for(request: &TeamRequest) -> RemoteTeam {
        RemoteTeam {
            team_id: "team-1".to_string(),
            team_alias: Some(request.team_alias.clone()),
            models: request.models.clone(),
            max_budget: request.max_budget.map(f64::from),
            budget_duration: request.budget_duration.clone(),
            tpm_limit: request.tpm_limit,
            rpm_limit: request.rpm_limit,
            blocked: Some(request.blocked),
            organization_id: request.organization_id.clone(),
            metadata: Some(request.metadata.clone()),
            ..Default::default()
        }
    }

    #[test]
    fn test_request_body() {
        let request = spec("eng", "100").to_request("uid-1").unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["team_alias"], "eng");
        assert_eq!(body["max_budget"], 100.0);
        assert!(body["models"].is_null());
        assert!(body.as_object().unwrap().contains_key("models"));
        assert_eq!(body["metadata"][crate::kinds::OWNER_MARKER], "uid-1");
    }

    #[test]
    fn test_invalid_budget_is_rejected() {
        assert!(spec("eng", "abc").to_request("uid-1").is_err());
    }

    #[test]
    fn test_blank_alias_is_rejected() {
        assert!(spec(" ", "1").to_request("uid-1").is_err());
    }

    #[test]
    fn test_in_sync_has_no_update() {
        let request = spec("eng", "100").to_request("uid-1").unwrap();
        let report = diff(&remote_for(&request), &request);
        assert!(!report.needs_update(), "{}", report);
    }

    #[test]
    fn test_budget_change_needs_update() {
        let old = spec("eng", "100").to_request("uid-1").unwrap();
        let new = spec("eng", "150").to_request("uid-1").unwrap();

        let report = diff(&remote_for(&old), &new);
        assert!(report.needs_update());
        assert_eq!(report.changed_fields(), vec!["max_budget"]);
    }

    #[test]
    fn test_models_empty_vs_unset() {
        let request = spec("eng", "100").to_request("uid-1").unwrap();
        let mut remote = remote_for(&request);
        remote.models = Some(vec![]);

        let report = diff(&remote, &request);
        assert!(report.needs_update());
        assert_eq!(report.changed_fields(), vec!["models"]);
    }

    #[test]
    fn test_remote_blocked_unset_equals_false() {
        let request = spec("eng", "100").to_request("uid-1").unwrap();
        let mut remote = remote_for(&request);
        remote.blocked = None;
        assert!(!diff(&remote, &request).needs_update());
    }

    #[test]
    fn test_field_table_is_complete() {
        let request = spec("eng", "100").to_request("uid-1").unwrap();
        let report = diff(&remote_for(&request), &request);
        let names: Vec<_> = report.fields.iter().map(|f| f.field).collect();
        let table: Vec<_> = FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, table);
    }

    #[test]
    fn test_remote_decodes_gateway_shape() {
        let remote: RemoteTeam = serde_json::from_value(json!({
            "team_id": "t-1",
            "team_alias": "eng",
            "models": [],
            "max_budget": null,
            "spend": 3.25,
            "members_with_roles": [{ "user_id": "u-1", "role": "admin" }],
            "unknown": "ignored"
        }))
        .unwrap();
        assert_eq!(remote.team_id, "t-1");
        assert_eq!(remote.member("u-1").unwrap().role.as_deref(), Some("admin"));

        let observed = observe(&remote);
        assert_eq!(observed.spend, Some(3.25));
        assert_eq!(observed.member_count, Some(1));
    }
}
