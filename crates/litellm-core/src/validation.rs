//! # Validation Module
//!
//! Projection-time checks on desired records.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Admission (outside this workspace)                            │
//! │  ├── Field formats, immutability of identity fields                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Typed decode of the stored document                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: THIS MODULE, run before any remote call                       │
//! │  ├── required identity fields, budgets, durations                       │
//! │  └── connection reference shape                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Gateway (rejections surface as LitellmError)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures in layer 3 become `InvalidSpec` / `ConnectionError` with no
//! remote traffic.

use crate::error::{ConnectionRefError, SpecError, SpecResult};
use crate::types::{ConnectionRef, ConnectionSource, DEFAULT_MASTER_KEY_FIELD, DEFAULT_URL_FIELD};

// =============================================================================
// String Validators
// =============================================================================

/// Returns the trimmed value, or `Required` if it is blank.
///
/// ## Example
/// ```rust
/// use litellm_core::validation::require;
///
/// assert_eq!(require("teamAlias", " eng ").unwrap(), "eng");
/// assert!(require("teamAlias", "  ").is_err());
/// ```
pub fn require<'a>(field: &str, value: &'a str) -> SpecResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SpecError::required(field));
    }
    Ok(value)
}

/// Validates an email-shaped identity field.
///
/// ## Rules
/// - Must not be empty
/// - Exactly one `@` with text on both sides
/// - No whitespace
pub fn validate_email<'a>(field: &str, value: &'a str) -> SpecResult<&'a str> {
    let value = require(field, value)?;

    if value.chars().any(char::is_whitespace) {
        return Err(SpecError::invalid(field, "must not contain whitespace"));
    }

    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(value)
        }
        _ => Err(SpecError::invalid(field, "must be an email address")),
    }
}

/// Validates a budget reset window such as `30s`, `12h`, `7d` or `1mo`.
pub fn validate_duration(field: &str, value: &str) -> SpecResult<()> {
    let value = value.trim();
    let digits = value.chars().take_while(char::is_ascii_digit).count();
    let unit = &value[digits..];

    if digits == 0 || !matches!(unit, "s" | "m" | "h" | "d" | "mo") {
        return Err(SpecError::invalid(
            field,
            format!("'{}' is not a duration like 30s, 12h, 7d or 1mo", value),
        ));
    }

    Ok(())
}

/// Validates an optional duration; unset or blank passes.
pub fn validate_optional_duration(field: &str, value: Option<&str>) -> SpecResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => validate_duration(field, v),
        _ => Ok(()),
    }
}

// =============================================================================
// Connection Reference
// =============================================================================

impl ConnectionRef {
    /// Validates the reference and resolves namespaces and key names.
    ///
    /// ## Rules
    /// - Exactly one of `secretRef` / `instanceRef`
    /// - The referenced name must not be empty
    /// - Namespace defaults to `record_namespace`
    pub fn source(&self, record_namespace: &str) -> Result<ConnectionSource, ConnectionRefError> {
        match (&self.secret_ref, &self.instance_ref) {
            (None, None) => Err(ConnectionRefError::Missing),
            (Some(_), Some(_)) => Err(ConnectionRefError::Ambiguous),
            (Some(secret), None) => {
                if secret.name.trim().is_empty() {
                    return Err(ConnectionRefError::EmptyName("secretRef"));
                }
                let keys = secret.keys.clone().unwrap_or_default();
                Ok(ConnectionSource::Secret {
                    namespace: namespace_or(&secret.namespace, record_namespace),
                    name: secret.name.trim().to_string(),
                    master_key_field: non_blank_or(keys.master_key, DEFAULT_MASTER_KEY_FIELD),
                    url_field: non_blank_or(keys.url, DEFAULT_URL_FIELD),
                })
            }
            (None, Some(instance)) => {
                if instance.name.trim().is_empty() {
                    return Err(ConnectionRefError::EmptyName("instanceRef"));
                }
                Ok(ConnectionSource::Instance {
                    namespace: namespace_or(&instance.namespace, record_namespace),
                    name: instance.name.trim().to_string(),
                })
            }
        }
    }
}

fn namespace_or(namespace: &Option<String>, fallback: &str) -> String {
    match namespace {
        Some(ns) if !ns.trim().is_empty() => ns.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn non_blank_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionKeys, InstanceConnectionRef, SecretConnectionRef};

    #[test]
    fn test_validate_email() {
        assert!(validate_email("userEmail", "alice@example.com").is_ok());
        assert!(validate_email("userEmail", "").is_err());
        assert!(validate_email("userEmail", "alice").is_err());
        assert!(validate_email("userEmail", "a@b@c").is_err());
        assert!(validate_email("userEmail", "al ice@example.com").is_err());
    }

    #[test]
    fn test_validate_duration() {
        for ok in ["30s", "5m", "12h", "7d", "1mo"] {
            assert!(validate_duration("budgetDuration", ok).is_ok(), "{}", ok);
        }
        for bad in ["", "d", "7w", "seven days", "-1d"] {
            assert!(validate_duration("budgetDuration", bad).is_err(), "{}", bad);
        }
        assert!(validate_optional_duration("budgetDuration", None).is_ok());
    }

    #[test]
    fn test_connection_ref_requires_exactly_one() {
        assert_eq!(
            ConnectionRef::default().source("ml"),
            Err(ConnectionRefError::Missing)
        );

        let both = ConnectionRef {
            secret_ref: Some(SecretConnectionRef {
                name: "a".to_string(),
                ..Default::default()
            }),
            instance_ref: Some(InstanceConnectionRef {
                name: "b".to_string(),
                namespace: None,
            }),
        };
        assert_eq!(both.source("ml"), Err(ConnectionRefError::Ambiguous));
    }

    #[test]
    fn test_secret_ref_defaults() {
        let cref = ConnectionRef {
            secret_ref: Some(SecretConnectionRef {
                name: "gw-conn".to_string(),
                namespace: None,
                keys: None,
            }),
            instance_ref: None,
        };
        assert_eq!(
            cref.source("ml").unwrap(),
            ConnectionSource::Secret {
                namespace: "ml".to_string(),
                name: "gw-conn".to_string(),
                master_key_field: "masterkey".to_string(),
                url_field: "url".to_string(),
            }
        );
    }

    #[test]
    fn test_secret_ref_explicit_keys() {
        let cref = ConnectionRef {
            secret_ref: Some(SecretConnectionRef {
                name: "gw-conn".to_string(),
                namespace: Some("shared".to_string()),
                keys: Some(ConnectionKeys {
                    master_key: Some("token".to_string()),
                    url: Some("endpoint".to_string()),
                }),
            }),
            instance_ref: None,
        };
        match cref.source("ml").unwrap() {
            ConnectionSource::Secret {
                namespace,
                master_key_field,
                url_field,
                ..
            } => {
                assert_eq!(namespace, "shared");
                assert_eq!(master_key_field, "token");
                assert_eq!(url_field, "endpoint");
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_instance_ref_empty_name() {
        let cref = ConnectionRef {
            secret_ref: None,
            instance_ref: Some(InstanceConnectionRef {
                name: " ".to_string(),
                namespace: None,
            }),
        };
        assert_eq!(
            cref.source("ml"),
            Err(ConnectionRefError::EmptyName("instanceRef"))
        );
    }
}
