//! # Error Types
//!
//! Domain-specific error types for litellm-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  litellm-core errors (this file)                                       │
//! │  ├── SpecError            - A desired record's spec cannot be projected │
//! │  └── ConnectionRefError   - A connection reference is malformed         │
//! │                                                                         │
//! │  litellm-reconcile errors (separate crate)                             │
//! │  └── ReconcileError       - Wraps both, maps them to condition reasons  │
//! │                                                                         │
//! │  Flow: SpecError ──► ReconcileError::InvalidSpec ──► Ready=False       │
//! │        ConnectionRefError ──► ReconcileError::Connection ──► Ready=False│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include the offending field and value in the message
//! 3. A `SpecError` never triggers a retry; the spec has to change first

use thiserror::Error;

// =============================================================================
// Spec Error
// =============================================================================

/// A desired record's spec cannot be turned into a gateway request.
///
/// Surfaced on the `Ready` condition with reason `InvalidSpec`. No remote call
/// is made for a record whose spec fails to project.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// A budget string is not a finite, non-negative decimal.
    ///
    /// ## When This Occurs
    /// ```text
    /// maxBudget: "abc"    → InvalidBudget { reason: "not a number" }
    /// maxBudget: "-5"     → InvalidBudget { reason: "must not be negative" }
    /// maxBudget: "NaN"    → InvalidBudget { reason: "must be finite" }
    /// ```
    #[error("{field} has invalid budget value '{value}': {reason}")]
    InvalidBudget {
        field: String,
        value: String,
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A field value is present but not acceptable.
    #[error("{field} is invalid: {reason}")]
    InvalidValue { field: String, reason: String },

    /// The stored document could not be decoded into the typed spec.
    #[error("spec could not be decoded: {0}")]
    Decode(String),
}

impl SpecError {
    /// Creates a Required error for a field.
    pub fn required(field: impl Into<String>) -> Self {
        SpecError::Required {
            field: field.into(),
        }
    }

    /// Creates an InvalidValue error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SpecError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Connection Reference Error
// =============================================================================

/// A connection reference does not name exactly one credential source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionRefError {
    /// Neither `secretRef` nor `instanceRef` is set.
    #[error("connectionRef must set one of secretRef or instanceRef")]
    Missing,

    /// Both `secretRef` and `instanceRef` are set.
    #[error("connectionRef must set only one of secretRef or instanceRef")]
    Ambiguous,

    /// The referenced object name is empty.
    #[error("connectionRef {0} name is empty")]
    EmptyName(&'static str),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with SpecError.
pub type SpecResult<T> = Result<T, SpecError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_error_message() {
        let err = SpecError::InvalidBudget {
            field: "maxBudget".to_string(),
            value: "abc".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "maxBudget has invalid budget value 'abc': not a number"
        );
    }

    #[test]
    fn test_helper_constructors() {
        assert_eq!(
            SpecError::required("teamAlias").to_string(),
            "teamAlias is required"
        );
        assert_eq!(
            SpecError::invalid("role", "unknown role 'owner'").to_string(),
            "role is invalid: unknown role 'owner'"
        );
    }

    #[test]
    fn test_connection_ref_messages() {
        assert!(ConnectionRefError::Missing.to_string().contains("one of"));
        assert!(ConnectionRefError::EmptyName("secretRef")
            .to_string()
            .contains("secretRef"));
    }
}
