//! # Account
//!
//! A gateway user account. Optionally created with an auto-generated key,
//! which is persisted in a secret owned by the record.
//!
//! Natural key: `userEmail`. Remote id: `user_id`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{non_negative, owned_metadata, ownership_from_metadata, trimmed, Metadata, Ownership};
use crate::budget::Budget;
use crate::diff::{Diff, DiffReport, FieldRule};
use crate::error::{SpecError, SpecResult};
use crate::types::{ConnectionRef, Sensitive};
use crate::validation::{validate_email, validate_optional_duration};

/// Roles the gateway accepts for a user.
pub const USER_ROLES: &[&str] = &[
    "proxy_admin",
    "proxy_admin_viewer",
    "internal_user",
    "internal_user_viewer",
];

fn default_user_role() -> String {
    "internal_user".to_string()
}

// =============================================================================
// Desired Spec
// =============================================================================

/// Desired state of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpec {
    pub connection_ref: ConnectionRef,

    /// Immutable after creation.
    pub user_email: String,

    #[serde(default)]
    pub user_alias: Option<String>,

    #[serde(default = "default_user_role")]
    pub user_role: String,

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
    pub metadata: Option<BTreeMap<String, String>>,

    /// Ask the gateway to generate a key for the user on creation.
    #[serde(default)]
    pub auto_create_key: bool,
}

impl AccountSpec {
    /// Projects the spec into a gateway request.
    pub fn to_request(&self, owner_uid: &str) -> SpecResult<AccountRequest> {
        let user_email = validate_email("userEmail", &self.user_email)?.to_string();
        validate_optional_duration("budgetDuration", self.budget_duration.as_deref())?;

        let user_role = self.user_role.trim().to_string();
        if !USER_ROLES.contains(&user_role.as_str()) {
            return Err(SpecError::invalid(
                "userRole",
                format!("unknown role '{}'", user_role),
            ));
        }

        Ok(AccountRequest {
            user_email,
            user_alias: trimmed(&self.user_alias),
            user_role,
            models: self.models.clone(),
            max_budget: Budget::parse_optional("maxBudget", self.max_budget.as_deref())?,
            budget_duration: trimmed(&self.budget_duration),
            tpm_limit: non_negative("tpmLimit", self.tpm_limit)?,
            rpm_limit: non_negative("rpmLimit", self.rpm_limit)?,
            metadata: owned_metadata(self.metadata.as_ref(), owner_uid),
            auto_create_key: self.auto_create_key,
        })
    }
}

// =============================================================================
// Gateway Request
// =============================================================================

/// Body of `/user/new` and (with `user_id` added) `/user/update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRequest {
    pub user_email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_alias: Option<String>,

    pub user_role: String,

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

    pub metadata: Metadata,

    /// Only sent on creation.
    #[serde(skip)]
    pub auto_create_key: bool,
}

// =============================================================================
// Remote View
// =============================================================================

/// A user as reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteAccount {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_alias: Option<String>,
    pub user_role: Option<String>,
    pub models: Option<Vec<String>>,
    pub max_budget: Option<f64>,
    pub budget_duration: Option<String>,
    pub budget_reset_at: Option<String>,
    pub tpm_limit: Option<i64>,
    pub rpm_limit: Option<i64>,
    pub metadata: Option<Metadata>,
    pub spend: Option<f64>,
    pub teams: Option<Vec<String>>,
}

impl RemoteAccount {
    pub fn ownership(&self, uid: &str) -> Ownership {
        ownership_from_metadata(self.metadata.as_ref(), uid)
    }
}

/// Response of `/user/new`: the user plus the generated key, if any.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountCreated {
    #[serde(flatten)]
    pub account: RemoteAccount,
    #[serde(default)]
    pub key: Option<Sensitive>,
}

// =============================================================================
// Field Table
// =============================================================================

pub const USER_EMAIL: FieldRule = FieldRule::equate_empty("user_email").informational();
pub const USER_ALIAS: FieldRule = FieldRule::equate_empty("user_alias");
pub const USER_ROLE: FieldRule = FieldRule::equate_empty("user_role");
pub const MODELS: FieldRule = FieldRule::strict("models");
pub const MAX_BUDGET: FieldRule = FieldRule::equate_empty("max_budget");
pub const BUDGET_DURATION: FieldRule = FieldRule::equate_empty("budget_duration");
pub const TPM_LIMIT: FieldRule = FieldRule::equate_empty("tpm_limit");
pub const RPM_LIMIT: FieldRule = FieldRule::equate_empty("rpm_limit");
pub const METADATA: FieldRule = FieldRule::equate_empty("metadata");

/// Every compared account field.
pub const FIELDS: &[FieldRule] = &[
    USER_EMAIL,
    USER_ALIAS,
    USER_ROLE,
    MODELS,
    MAX_BUDGET,
    BUDGET_DURATION,
    TPM_LIMIT,
    RPM_LIMIT,
    METADATA,
];

/// Compares the remote user with the desired request.
pub fn diff(remote: &RemoteAccount, desired: &AccountRequest) -> DiffReport {
    Diff::new()
        .check(USER_EMAIL, &remote.user_email, &Some(desired.user_email.clone()))
        .check(USER_ALIAS, &remote.user_alias, &desired.user_alias)
        .check(USER_ROLE, &remote.user_role, &Some(desired.user_role.clone()))
        .check(MODELS, &remote.models, &desired.models)
        .check(
            MAX_BUDGET,
            &remote.max_budget,
            &desired.max_budget.map(f64::from),
        )
        .check(BUDGET_DURATION, &remote.budget_duration, &desired.budget_duration)
        .check(TPM_LIMIT, &remote.tpm_limit, &desired.tpm_limit)
        .check(RPM_LIMIT, &remote.rpm_limit, &desired.rpm_limit)
        .check(METADATA, &remote.metadata, &Some(desired.metadata.clone()))
        .finish()
}

// =============================================================================
// Observed Status
// =============================================================================

/// Account fields mirrored into status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountObserved {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_reset_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<String>>,
}

pub fn observe(remote: &RemoteAccount) -> AccountObserved {
    AccountObserved {
        spend: remote.spend,
        max_budget: remote.max_budget,
        budget_reset_at: remote.budget_reset_at.clone(),
        user_role: remote.user_role.clone(),
        teams: remote.teams.clone(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(extra: serde_json::Value) -> AccountSpec {
        let mut base = json!({
            "connectionRef": { "instanceRef": { "name": "gw" } },
            "userEmail": "alice@example.com",
        });
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_defaults() {
        let spec = spec(json!({}));
        assert_eq!(spec.user_role, "internal_user");
        assert!(!spec.auto_create_key);
    }

    #[test]
    fn test_request_excludes_auto_create_key() {
        let request = spec(json!({ "autoCreateKey": true, "maxBudget": "12.50" }))
            .to_request("uid-1")
            .unwrap();
        assert!(request.auto_create_key);

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("auto_create_key").is_none());
        assert_eq!(body["max_budget"], 12.5);
        assert_eq!(body["user_role"], "internal_user");
    }

    #[test]
    fn test_rejects_bad_email_and_role() {
        assert!(spec(json!({ "userEmail": "alice" })).to_request("u").is_err());
        assert!(spec(json!({ "userRole": "owner" })).to_request("u").is_err());
    }

    #[test]
    fn test_diff_detects_role_change() {
        let request = spec(json!({ "userRole": "proxy_admin" }))
            .to_request("uid-1")
            .unwrap();
        let remote = RemoteAccount {
            user_id: "u-1".to_string(),
            user_email: Some("alice@example.com".to_string()),
            user_role: Some("internal_user".to_string()),
            metadata: Some(request.metadata.clone()),
            ..Default::default()
        };

        let report = diff(&remote, &request);
        assert!(report.needs_update());
        assert_eq!(report.changed_fields(), vec!["user_role"]);
    }

    #[test]
    fn test_created_response_carries_key() {
        let created: AccountCreated = serde_json::from_value(json!({
            "user_id": "u-1",
            "user_email": "alice@example.com",
            "key": "sk-generated"
        }))
        .unwrap();
        assert_eq!(created.account.user_id, "u-1");
        assert_eq!(created.key.as_ref().map(Sensitive::expose), Some("sk-generated"));
    }
}
