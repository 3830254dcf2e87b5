//! # API Key
//!
//! A virtual key on the gateway. The key material is only returned once, on
//! generation, and is persisted in a secret owned by the record.
//!
//! Natural key: `keyAlias`. Remote id: the key's token hash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{non_negative, owned_metadata, ownership_from_metadata, trimmed, Metadata, Ownership};
use crate::budget::Budget;
use crate::diff::{Diff, DiffReport, FieldRule};
use crate::error::{SpecError, SpecResult};
use crate::types::{ConnectionRef, Sensitive};
use crate::validation::{require, validate_duration, validate_optional_duration};

// =============================================================================
// Desired Spec
// =============================================================================

/// Desired state of a virtual key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySpec {
    pub connection_ref: ConnectionRef,

    /// Immutable after creation.
    pub key_alias: String,

    /// Team the key belongs to. Immutable after creation.
    #[serde(default)]
    pub team_id: Option<String>,

    /// User the key belongs to.
    #[serde(default)]
    pub user_id: Option<String>,

    /// `None` allows every model; `Some([])` allows none.
    #[serde(default)]
    pub models: Option<Vec<String>>,

    #[serde(default)]
    pub max_budget: Option<String>,

    #[serde(default)]
    pub soft_budget: Option<String>,

    #[serde(default)]
    pub budget_duration: Option<String>,

    #[serde(default)]
    pub tpm_limit: Option<i64>,

    #[serde(default)]
    pub rpm_limit: Option<i64>,

    #[serde(default)]
    pub max_parallel_requests: Option<i64>,

    /// Lifetime of the key from creation, e.g. `30d`.
    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ApiKeySpec {
    /// Projects the spec into a gateway request.
    pub fn to_request(&self, owner_uid: &str) -> SpecResult<ApiKeyRequest> {
        let key_alias = require("keyAlias", &self.key_alias)?.to_string();
        validate_optional_duration("budgetDuration", self.budget_duration.as_deref())?;

        let duration = trimmed(&self.duration);
        if let Some(d) = &duration {
            validate_duration("duration", d)?;
        }

        let max_budget = Budget::parse_optional("maxBudget", self.max_budget.as_deref())?;
        let soft_budget = Budget::parse_optional("softBudget", self.soft_budget.as_deref())?;
        if let (Some(max), Some(soft)) = (max_budget, soft_budget) {
            if soft > max {
                return Err(SpecError::invalid(
                    "softBudget",
                    format!("{} exceeds maxBudget {}", soft, max),
                ));
            }
        }

        Ok(ApiKeyRequest {
            key_alias,
            team_id: trimmed(&self.team_id),
            user_id: trimmed(&self.user_id),
            models: self.models.clone(),
            max_budget,
            soft_budget,
            budget_duration: trimmed(&self.budget_duration),
            tpm_limit: non_negative("tpmLimit", self.tpm_limit)?,
            rpm_limit: non_negative("rpmLimit", self.rpm_limit)?,
            max_parallel_requests: non_negative(
                "maxParallelRequests",
                self.max_parallel_requests,
            )?,
            duration,
            blocked: self.blocked,
            tags: self.tags.clone(),
            metadata: owned_metadata(self.metadata.as_ref(), owner_uid),
        })
    }
}

// =============================================================================
// Gateway Request
// =============================================================================

/// Body of `/key/generate` and (with `key` added) `/key/update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiKeyRequest {
    pub key_alias: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Always serialized: `null` and `[]` mean different things.
    pub models: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<Budget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_budget: Option<Budget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_duration: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpm_limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm_limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_requests: Option<i64>,

    /// Only meaningful on generation; the gateway turns it into `expires`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    pub blocked: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    pub metadata: Metadata,
}

// =============================================================================
// Remote View
// =============================================================================

/// A key as reported by the gateway (never includes the key material).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteApiKey {
    /// Token hash; the remote id.
    pub token: String,
    pub key_alias: Option<String>,
    pub key_name: Option<String>,
    pub team_id: Option<String>,
    pub user_id: Option<String>,
    pub models: Option<Vec<String>>,
    pub max_budget: Option<f64>,
    pub soft_budget: Option<f64>,
    pub budget_duration: Option<String>,
    pub budget_reset_at: Option<String>,
    pub tpm_limit: Option<i64>,
    pub rpm_limit: Option<i64>,
    pub max_parallel_requests: Option<i64>,
    pub blocked: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub spend: Option<f64>,
    pub expires: Option<String>,
}

impl RemoteApiKey {
    pub fn ownership(&self, uid: &str) -> Ownership {
        ownership_from_metadata(self.metadata.as_ref(), uid)
    }
}

/// Response of `/key/generate` and `/key/regenerate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeyIssued {
    /// The key material, shown once.
    pub key: Sensitive,
    #[serde(flatten)]
    pub remote: RemoteApiKey,
}

// =============================================================================
// Field Table
// =============================================================================

pub const KEY_ALIAS: FieldRule = FieldRule::equate_empty("key_alias").informational();
pub const TEAM_ID: FieldRule = FieldRule::equate_empty("team_id").informational();
pub const USER_ID: FieldRule = FieldRule::equate_empty("user_id");
pub const MODELS: FieldRule = FieldRule::strict("models");
pub const MAX_BUDGET: FieldRule = FieldRule::equate_empty("max_budget");
pub const SOFT_BUDGET: FieldRule = FieldRule::equate_empty("soft_budget");
pub const BUDGET_DURATION: FieldRule = FieldRule::equate_empty("budget_duration");
pub const TPM_LIMIT: FieldRule = FieldRule::equate_empty("tpm_limit");
pub const RPM_LIMIT: FieldRule = FieldRule::equate_empty("rpm_limit");
pub const MAX_PARALLEL_REQUESTS: FieldRule = FieldRule::equate_empty("max_parallel_requests");
pub const BLOCKED: FieldRule = FieldRule::equate_empty("blocked");
pub const TAGS: FieldRule = FieldRule::equate_empty("tags");
pub const METADATA: FieldRule = FieldRule::equate_empty("metadata");

/// Every compared key field.
pub const FIELDS: &[FieldRule] = &[
    KEY_ALIAS,
    TEAM_ID,
    USER_ID,
    MODELS,
    MAX_BUDGET,
    SOFT_BUDGET,
    BUDGET_DURATION,
    TPM_LIMIT,
    RPM_LIMIT,
    MAX_PARALLEL_REQUESTS,
    BLOCKED,
    TAGS,
    METADATA,
];

/// Compares the remote key with the desired request.
///
/// `duration` is not compared; it only shapes `expires` at generation time.
pub fn diff(remote: &RemoteApiKey, desired: &ApiKeyRequest) -> DiffReport {
    Diff::new()
        .check(KEY_ALIAS, &remote.key_alias, &Some(desired.key_alias.clone()))
        .check(TEAM_ID, &remote.team_id, &desired.team_id)
        .check(USER_ID, &remote.user_id, &desired.user_id)
        .check(MODELS, &remote.models, &desired.models)
        .check(
            MAX_BUDGET,
            &remote.max_budget,
            &desired.max_budget.map(f64::from),
        )
        .check(
            SOFT_BUDGET,
            &remote.soft_budget,
            &desired.soft_budget.map(f64::from),
        )
        .check(BUDGET_DURATION, &remote.budget_duration, &desired.budget_duration)
        .check(TPM_LIMIT, &remote.tpm_limit, &desired.tpm_limit)
        .check(RPM_LIMIT, &remote.rpm_limit, &desired.rpm_limit)
        .check(
            MAX_PARALLEL_REQUESTS,
            &remote.max_parallel_requests,
            &desired.max_parallel_requests,
        )
        .check(
            BLOCKED,
            &Some(remote.blocked.unwrap_or(false)),
            &Some(desired.blocked),
        )
        .check(TAGS, &remote.tags, &desired.tags)
        .check(METADATA, &remote.metadata, &Some(desired.metadata.clone()))
        .finish()
}

// =============================================================================
// Observed Status
// =============================================================================

/// Key fields mirrored into status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiKeyObserved {
    /// Redacted display form of the key, e.g. `sk-...abcd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_reset_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

pub fn observe(remote: &RemoteApiKey) -> ApiKeyObserved {
    ApiKeyObserved {
        key_name: remote.key_name.clone(),
        spend: remote.spend,
        max_budget: remote.max_budget,
        budget_reset_at: remote.budget_reset_at.clone(),
        expires: remote.expires.clone(),
        blocked: remote.blocked,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(extra: serde_json::Value) -> ApiKeySpec {
        let mut base = json!({
            "connectionRef": { "secretRef": { "name": "gw" } },
            "keyAlias": "ci-runner",
        });
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_request_body() {
        let request = spec(json!({ "models": [], "maxBudget": "10", "duration": "30d" }))
            .to_request("uid-1")
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["key_alias"], "ci-runner");
        assert_eq!(body["models"], json!([]));
        assert_eq!(body["duration"], "30d");
        assert_eq!(body["blocked"], false);
    }

    #[test]
    fn test_soft_budget_above_max_is_rejected() {
        let err = spec(json!({ "maxBudget": "10", "softBudget": "20" }))
            .to_request("uid-1")
            .unwrap_err();
        assert!(err.to_string().contains("softBudget"));
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        assert!(spec(json!({ "duration": "forever" }))
            .to_request("uid-1")
            .is_err());
    }

    #[test]
    fn test_diff_ignores_duration_and_reports_tags() {
        let request = spec(json!({ "duration": "30d", "tags": ["ci"] }))
            .to_request("uid-1")
            .unwrap();
        let remote = RemoteApiKey {
            token: "hash".to_string(),
            key_alias: Some("ci-runner".to_string()),
            tags: Some(vec![]),
            metadata: Some(request.metadata.clone()),
            ..Default::default()
        };

        let report = diff(&remote, &request);
        assert_eq!(report.changed_fields(), vec!["tags"]);
        assert!(report.needs_update());
    }

    #[test]
    fn test_team_change_is_informational() {
        let request = spec(json!({ "teamId": "t-2" })).to_request("uid-1").unwrap();
        let remote = RemoteApiKey {
            token: "hash".to_string(),
            key_alias: Some("ci-runner".to_string()),
            team_id: Some("t-1".to_string()),
            metadata: Some(request.metadata.clone()),
            ..Default::default()
        };

        let report = diff(&remote, &request);
        assert_eq!(report.changed_fields(), vec!["team_id"]);
        assert!(!report.needs_update());
    }

    #[test]
    fn test_issued_response() {
        let issued: ApiKeyIssued = serde_json::from_value(json!({
            "key": "sk-secret",
            "token": "hash-1",
            "key_alias": "ci-runner",
            "expires": null
        }))
        .unwrap();
        assert_eq!(issued.key.expose(), "sk-secret");
        assert!(!format!("{:?}", issued).contains("sk-secret"));
        assert_eq!(issued.remote.token, "hash-1");
    }
}
