//! # Model Registration
//!
//! A model deployment registered on the gateway.
//!
//! The model id is chosen by us: `model_info.id = <record uid>`. Lookups by
//! natural key and by remote id are therefore the same call, and a found
//! model with that id is always ours.

use serde::{Deserialize, Serialize};

use super::{non_negative, trimmed, Ownership};
use crate::budget::Budget;
use crate::diff::{Diff, DiffReport, FieldRule};
use crate::error::{SpecError, SpecResult};
use crate::types::{ConnectionRef, SecretKeyRef, Sensitive};
use crate::validation::require;

// =============================================================================
// Desired Spec
// =============================================================================

/// Desired model registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub connection_ref: ConnectionRef,

    /// Public model name clients call. Immutable after creation.
    pub model_name: String,

    pub litellm_params: ModelParamsSpec,

    #[serde(default)]
    pub model_info: Option<ModelInfoSpec>,
}

/// Provider routing parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParamsSpec {
    /// Provider model, e.g. `openai/gpt-4o`.
    pub model: String,

    #[serde(default)]
    pub api_base: Option<String>,

    #[serde(default)]
    pub api_version: Option<String>,

    /// Secret key holding the provider credential.
    #[serde(default)]
    pub api_key_secret_ref: Option<SecretKeyRef>,

    #[serde(default)]
    pub custom_llm_provider: Option<String>,

    #[serde(default)]
    pub rpm: Option<i64>,

    #[serde(default)]
    pub tpm: Option<i64>,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,

    #[serde(default)]
    pub max_retries: Option<i64>,

    #[serde(default)]
    pub input_cost_per_token: Option<String>,

    #[serde(default)]
    pub output_cost_per_token: Option<String>,
}

/// Descriptive model information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfoSpec {
    #[serde(default)]
    pub base_model: Option<String>,

    /// e.g. `chat`, `embedding`.
    #[serde(default)]
    pub mode: Option<String>,
}

impl ModelSpec {
    /// Projects the spec into a gateway request.
    ///
    /// `api_key` is the provider credential already read from
    /// `apiKeySecretRef`, if one is referenced.
    pub fn to_request(&self, owner_uid: &str, api_key: Option<Sensitive>) -> SpecResult<ModelRequest> {
        let model_name = require("modelName", &self.model_name)?.to_string();
        let params = &self.litellm_params;
        let model = require("litellmParams.model", &params.model)?.to_string();

        if let Some(timeout) = params.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(SpecError::invalid(
                    "litellmParams.timeout",
                    "must be a positive number of seconds",
                ));
            }
        }

        let info = self.model_info.clone().unwrap_or_default();

        Ok(ModelRequest {
            model_name,
            litellm_params: ModelParamsRequest {
                model,
                api_base: trimmed(&params.api_base),
                api_version: trimmed(&params.api_version),
                api_key,
                custom_llm_provider: trimmed(&params.custom_llm_provider),
                rpm: non_negative("litellmParams.rpm", params.rpm)?,
                tpm: non_negative("litellmParams.tpm", params.tpm)?,
                timeout: params.timeout,
                max_retries: non_negative("litellmParams.maxRetries", params.max_retries)?,
                input_cost_per_token: Budget::parse_optional(
                    "litellmParams.inputCostPerToken",
                    params.input_cost_per_token.as_deref(),
                )?,
                output_cost_per_token: Budget::parse_optional(
                    "litellmParams.outputCostPerToken",
                    params.output_cost_per_token.as_deref(),
                )?,
            },
            model_info: ModelInfoRequest {
                id: owner_uid.to_string(),
                base_model: trimmed(&info.base_model),
                mode: trimmed(&info.mode),
            },
        })
    }
}

// =============================================================================
// Gateway Request
// =============================================================================

/// Body of `/model/new` and `/model/update`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model_name: String,
    pub litellm_params: ModelParamsRequest,
    pub model_info: ModelInfoRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParamsRequest {
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Never compared; the gateway does not echo it back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Sensitive>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_llm_provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpm: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_cost_per_token: Option<Budget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cost_per_token: Option<Budget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfoRequest {
    /// Deterministic model id; the record uid.
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

// =============================================================================
// Remote View
// =============================================================================

/// A model deployment as reported by `/model/info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteModel {
    pub model_name: Option<String>,
    pub litellm_params: RemoteModelParams,
    pub model_info: RemoteModelInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteModelParams {
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub api_version: Option<String>,
    pub custom_llm_provider: Option<String>,
    pub rpm: Option<i64>,
    pub tpm: Option<i64>,
    pub timeout: Option<f64>,
    pub max_retries: Option<i64>,
    pub input_cost_per_token: Option<f64>,
    pub output_cost_per_token: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteModelInfo {
    pub id: Option<String>,
    pub base_model: Option<String>,
    pub mode: Option<String>,
    pub db_model: Option<bool>,
}

impl RemoteModel {
    /// Returns the model id, or an empty string if the gateway omitted it.
    pub fn id(&self) -> &str {
        self.model_info.id.as_deref().unwrap_or_default()
    }

    pub fn ownership(&self, uid: &str) -> Ownership {
        if self.id() == uid {
            Ownership::Owned
        } else {
            Ownership::Foreign
        }
    }
}

// =============================================================================
// Field Table
// =============================================================================

pub const MODEL_NAME: FieldRule = FieldRule::equate_empty("model_name").informational();
pub const PROVIDER_MODEL: FieldRule = FieldRule::equate_empty("litellm_params.model");
pub const API_BASE: FieldRule = FieldRule::equate_empty("litellm_params.api_base");
pub const API_VERSION: FieldRule = FieldRule::equate_empty("litellm_params.api_version");
pub const CUSTOM_LLM_PROVIDER: FieldRule =
    FieldRule::equate_empty("litellm_params.custom_llm_provider");
pub const RPM: FieldRule = FieldRule::equate_empty("litellm_params.rpm");
pub const TPM: FieldRule = FieldRule::equate_empty("litellm_params.tpm");
pub const TIMEOUT: FieldRule = FieldRule::equate_empty("litellm_params.timeout");
pub const MAX_RETRIES: FieldRule = FieldRule::equate_empty("litellm_params.max_retries");
pub const INPUT_COST: FieldRule = FieldRule::equate_empty("litellm_params.input_cost_per_token");
pub const OUTPUT_COST: FieldRule =
    FieldRule::equate_empty("litellm_params.output_cost_per_token");
pub const BASE_MODEL: FieldRule = FieldRule::equate_empty("model_info.base_model");
pub const MODE: FieldRule = FieldRule::equate_empty("model_info.mode");

/// Every compared model field. The provider credential is never compared.
pub const FIELDS: &[FieldRule] = &[
    MODEL_NAME,
    PROVIDER_MODEL,
    API_BASE,
    API_VERSION,
    CUSTOM_LLM_PROVIDER,
    RPM,
    TPM,
    TIMEOUT,
    MAX_RETRIES,
    INPUT_COST,
    OUTPUT_COST,
    BASE_MODEL,
    MODE,
];

/// Compares the remote model with the desired request.
pub fn diff(remote: &RemoteModel, desired: &ModelRequest) -> DiffReport {
    let rp = &remote.litellm_params;
    let dp = &desired.litellm_params;
    let ri = &remote.model_info;
    let di = &desired.model_info;

    Diff::new()
        .check(MODEL_NAME, &remote.model_name, &Some(desired.model_name.clone()))
        .check(PROVIDER_MODEL, &rp.model, &Some(dp.model.clone()))
        .check(API_BASE, &rp.api_base, &dp.api_base)
        .check(API_VERSION, &rp.api_version, &dp.api_version)
        .check(CUSTOM_LLM_PROVIDER, &rp.custom_llm_provider, &dp.custom_llm_provider)
        .check(RPM, &rp.rpm, &dp.rpm)
        .check(TPM, &rp.tpm, &dp.tpm)
        .check(TIMEOUT, &rp.timeout, &dp.timeout)
        .check(MAX_RETRIES, &rp.max_retries, &dp.max_retries)
        .check(
            INPUT_COST,
            &rp.input_cost_per_token,
            &dp.input_cost_per_token.map(f64::from),
        )
        .check(
            OUTPUT_COST,
            &rp.output_cost_per_token,
            &dp.output_cost_per_token.map(f64::from),
        )
        .check(BASE_MODEL, &ri.base_model, &di.base_model)
        .check(MODE, &ri.mode, &di.mode)
        .finish()
}

// =============================================================================
// Observed Status
// =============================================================================

/// Model fields mirrored into status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelObserved {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_model: Option<String>,
    /// Whether the gateway stores the model in its database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_model: Option<bool>,
}

pub fn observe(remote: &RemoteModel) -> ModelObserved {
    ModelObserved {
        model_name: remote.model_name.clone(),
        provider_model: remote.litellm_params.model.clone(),
        db_model: remote.model_info.db_model,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> ModelSpec {
        serde_json::from_value(json!({
            "connectionRef": { "secretRef": { "name": "gw" } },
            "modelName": "gpt-4o",
            "litellmParams": {
                "model": "openai/gpt-4o",
                "apiKeySecretRef": { "name": "openai", "key": "apiKey" },
                "inputCostPerToken": "0.0000025",
                "rpm": 100
            },
            "modelInfo": { "mode": "chat" }
        }))
        .unwrap()
    }

    fn remote_for(request: &ModelRequest) -> RemoteModel {
        serde_json::from_value(json!({
            "model_name": request.model_name,
            "litellm_params": {
                "model": request.litellm_params.model,
                "input_cost_per_token": 0.0000025,
                "rpm": 100,
                "api_key": "sk-redacted"
            },
            "model_info": { "id": request.model_info.id, "mode": "chat", "db_model": true }
        }))
        .unwrap()
    }

    #[test]
    fn test_request_carries_deterministic_id_and_key() {
        let request = spec()
            .to_request("uid-1", Some(Sensitive::new("sk-provider")))
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model_info"]["id"], "uid-1");
        assert_eq!(body["litellm_params"]["api_key"], "sk-provider");
        assert!(!format!("{:?}", request).contains("sk-provider"));
    }

    #[test]
    fn test_in_sync_ignores_provider_key() {
        let request = spec()
            .to_request("uid-1", Some(Sensitive::new("sk-provider")))
            .unwrap();
        let report = diff(&remote_for(&request), &request);
        assert!(!report.needs_update(), "{}", report);
    }

    #[test]
    fn test_rpm_drift() {
        let request = spec().to_request("uid-1", None).unwrap();
        let mut remote = remote_for(&request);
        remote.litellm_params.rpm = Some(5);

        let report = diff(&remote, &request);
        assert_eq!(report.changed_fields(), vec!["litellm_params.rpm"]);
    }

    #[test]
    fn test_invalid_params() {
        let mut bad = spec();
        bad.litellm_params.input_cost_per_token = Some("cheap".to_string());
        assert!(bad.to_request("uid-1", None).is_err());

        let mut bad = spec();
        bad.litellm_params.timeout = Some(0.0);
        assert!(bad.to_request("uid-1", None).is_err());

        let mut bad = spec();
        bad.litellm_params.model = String::new();
        assert!(bad.to_request("uid-1", None).is_err());
    }

    #[test]
    fn test_ownership_by_id() {
        let request = spec().to_request("uid-1", None).unwrap();
        let remote = remote_for(&request);
        assert_eq!(remote.ownership("uid-1"), Ownership::Owned);
        assert_eq!(remote.ownership("uid-2"), Ownership::Foreign);
        assert_eq!(observe(&remote).db_model, Some(true));
    }
}
