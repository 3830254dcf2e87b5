//! # Budget Module
//!
//! Provides the `Budget` type for spend limits authored as decimal strings.
//!
//! ## Why Strings In The Spec?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE SCHEMA PROBLEM                                                     │
//! │                                                                         │
//! │  Record schemas round-trip numbers through YAML, JSON and generated    │
//! │  clients. "12.50" typed as a float can come back as 12.5, 1.25e1 or    │
//! │  fail validation depending on the tool in the middle.                  │
//! │                                                                         │
//! │  OUR SOLUTION: author budgets as strings, parse exactly once here      │
//! │    maxBudget: "12.50"  ──► Budget(12.5) ──► {"max_budget": 12.5}        │
//! │    maxBudget: "abc"    ──► SpecError::InvalidBudget (no remote call)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use litellm_core::budget::Budget;
//!
//! let budget = Budget::parse("maxBudget", "12.50").unwrap();
//! assert_eq!(budget.value(), 12.5);
//!
//! assert!(Budget::parse("maxBudget", "abc").is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SpecError, SpecResult};

// =============================================================================
// Budget Type
// =============================================================================

/// A parsed, finite, non-negative spend limit in the gateway's currency unit.
///
/// Serializes as a bare JSON number so it can be placed directly in gateway
/// request bodies.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Budget(f64);

impl Budget {
    /// Parses a budget string.
    ///
    /// ## Rules
    /// - Surrounding whitespace is ignored
    /// - Must parse as a decimal number
    /// - Must be finite and not negative
    ///
    /// ## Example
    /// ```rust
    /// use litellm_core::budget::Budget;
    ///
    /// assert_eq!(Budget::parse("maxBudget", "100").unwrap().value(), 100.0);
    /// assert_eq!(Budget::parse("maxBudget", " 0.5 ").unwrap().value(), 0.5);
    /// assert!(Budget::parse("maxBudget", "-1").is_err());
    /// ```
    pub fn parse(field: &str, raw: &str) -> SpecResult<Self> {
        let trimmed = raw.trim();

        let value: f64 = trimmed.parse().map_err(|_| SpecError::InvalidBudget {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "not a number".to_string(),
        })?;

        if !value.is_finite() {
            return Err(SpecError::InvalidBudget {
                field: field.to_string(),
                value: raw.to_string(),
                reason: "must be finite".to_string(),
            });
        }

        if value < 0.0 {
            return Err(SpecError::InvalidBudget {
                field: field.to_string(),
                value: raw.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        Ok(Budget(value))
    }

    /// Parses an optional budget string.
    ///
    /// `None` and blank strings mean "no budget specified" and yield `Ok(None)`.
    pub fn parse_optional(field: &str, raw: Option<&str>) -> SpecResult<Option<Self>> {
        match raw {
            Some(s) if !s.trim().is_empty() => Self::parse(field, s).map(Some),
            _ => Ok(None),
        }
    }

    /// Creates a budget from an already-validated number.
    ///
    /// Used when projecting gateway responses, which are trusted to be finite.
    #[inline]
    pub const fn from_value(value: f64) -> Self {
        Budget(value)
    }

    /// Returns the numeric value.
    #[inline]
    pub const fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Budget> for f64 {
    fn from(budget: Budget) -> Self {
        budget.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
