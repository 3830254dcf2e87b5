//! # Diff Engine
//!
//! Field-level drift detection between the last-observed remote entity and
//! the request projected from a desired record.
//!
//! ## Field Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every compared field is declared by a FieldRule:                       │
//! │                                                                         │
//! │    (name, equate_empty, forces_update)                                  │
//! │                                                                         │
//! │  equate_empty = true     None == Some([]) == Some("") == Some({})       │
//! │                          "value was never supplied"                     │
//! │                                                                         │
//! │  equate_empty = false    None != Some([])                               │
//! │  (strict)                models: None  → every model allowed            │
//! │                          models: []    → no model allowed               │
//! │                                                                         │
//! │  forces_update = false   a change is reported but never re-sent         │
//! │  (informational)                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use litellm_core::diff::{Diff, FieldRule};
//!
//! const MAX_BUDGET: FieldRule = FieldRule::equate_empty("max_budget");
//! const MODELS: FieldRule = FieldRule::strict("models");
//!
//! let remote_models: Option<Vec<String>> = Some(vec![]);
//! let desired_models: Option<Vec<String>> = None;
//!
//! let report = Diff::new()
//!     .check(MAX_BUDGET, &Some(100.0), &Some(150.0))
//!     .check(MODELS, &remote_models, &desired_models)
//!     .finish();
//!
//! assert!(report.needs_update());
//! assert_eq!(report.changed_fields(), vec!["max_budget", "models"]);
//! ```

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// =============================================================================
// Field Rule
// =============================================================================

/// How a single field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Gateway field name, used in reports and update bodies.
    pub name: &'static str,
    /// Treat unset and empty as equal.
    pub equate_empty: bool,
    /// Whether a detected change requires a remote update call.
    pub forces_update: bool,
}

impl FieldRule {
    /// A field where unset and empty are the same thing.
    pub const fn equate_empty(name: &'static str) -> Self {
        FieldRule {
            name,
            equate_empty: true,
            forces_update: true,
        }
    }

    /// A field where unset and empty mean different things.
    pub const fn strict(name: &'static str) -> Self {
        FieldRule {
            name,
            equate_empty: false,
            forces_update: true,
        }
    }

    /// Marks the field as informational: changes are reported but never re-sent.
    pub const fn informational(self) -> Self {
        FieldRule {
            forces_update: false,
            ..self
        }
    }

    /// Compares two optional values under this rule.
    pub fn equal<T>(&self, current: &Option<T>, expected: &Option<T>) -> bool
    where
        T: PartialEq + Emptiness,
    {
        if self.equate_empty && is_absent(current) && is_absent(expected) {
            return true;
        }
        current == expected
    }
}

fn is_absent<T: Emptiness>(value: &Option<T>) -> bool {
    value.as_ref().map_or(true, T::is_empty_value)
}

// =============================================================================
// Emptiness
// =============================================================================

/// Values that have an "empty" form.
///
/// Numbers and booleans are never empty; `0` is a real limit.
pub trait Emptiness {
    fn is_empty_value(&self) -> bool;
}

impl Emptiness for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiness for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Emptiness for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Emptiness for HashMap<K, V, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Emptiness for Value {
    fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

macro_rules! never_empty {
    ($($t:ty),*) => {
        $(impl Emptiness for $t {
            fn is_empty_value(&self) -> bool {
                false
            }
        })*
    };
}

never_empty!(f64, i64, u64, i32, bool);

// =============================================================================
// Field Change
// =============================================================================

/// The comparison result of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    /// Remote value.
    pub current: Value,
    /// Desired value.
    pub expected: Value,
    pub changed: bool,
    pub forces_update: bool,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.current, self.expected)
    }
}

// =============================================================================
// Diff Report
// =============================================================================

/// Outcome of a diff: every compared field, changed or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    pub fields: Vec<FieldChange>,
}

impl DiffReport {
    /// True if any changed field forces an update.
    pub fn needs_update(&self) -> bool {
        self.fields.iter().any(|f| f.changed && f.forces_update)
    }

    /// Fields that differ, informational ones included.
    pub fn changes(&self) -> impl Iterator<Item = &FieldChange> {
        self.fields.iter().filter(|f| f.changed)
    }

    /// Names of fields that differ.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.changes().map(|f| f.field).collect()
    }

    /// Changed fields that force an update and whose desired value is empty.
    ///
    /// These are sent as explicit `null` so the gateway clears them.
    pub fn cleared_fields(&self) -> Vec<&'static str> {
        self.changes()
            .filter(|f| f.forces_update && f.expected.is_null())
            .map(|f| f.field)
            .collect()
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldChange> {
        self.fields.iter().find(|f| f.field == name)
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for change in self.changes() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}", change)?;
            first = false;
        }
        if first {
            f.write_str("no changes")?;
        }
        Ok(())
    }
}

// =============================================================================
// Diff Builder
// =============================================================================

/// Accumulates field comparisons into a [`DiffReport`].
#[derive(Debug, Default)]
pub struct Diff {
    report: DiffReport,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares one field and records the result.
    pub fn check<T>(mut self, rule: FieldRule, current: &Option<T>, expected: &Option<T>) -> Self
    where
        T: PartialEq + Emptiness + Serialize,
    {
        let changed = !rule.equal(current, expected);
        self.report.fields.push(FieldChange {
            field: rule.name,
            current: to_json(current),
            expected: to_json(expected),
            changed,
            forces_update: rule.forces_update,
        });
        self
    }

    pub fn finish(self) -> DiffReport {
        self.report
    }
}

fn to_json<T: Serialize>(value: &Option<T>) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BUDGET: FieldRule = FieldRule::equate_empty("max_budget");
    const MODELS: FieldRule = FieldRule::strict("models");
    const TAGS: FieldRule = FieldRule::equate_empty("tags");
    const SPEND: FieldRule = FieldRule::equate_empty("spend").informational();

    fn list(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_equate_empty_nil_vs_empty_list() {
        let report = Diff::new().check(TAGS, &list(&[]), &None).finish();
        assert!(!report.needs_update());

        let report = Diff::new().check(TAGS, &None, &list(&[])).finish();
        assert!(!report.needs_update());
        assert!(report.changed_fields().is_empty());
    }

    #[test]
    fn test_strict_nil_vs_empty_list_is_a_change() {
        let report = Diff::new().check(MODELS, &list(&[]), &None).finish();
        assert!(report.needs_update());
        assert_eq!(report.changed_fields(), vec!["models"]);

        let report = Diff::new().check(MODELS, &None, &list(&[])).finish();
        assert!(report.needs_update());
    }

    #[test]
    fn test_strict_equal_lists() {
        let report = Diff::new()
            .check(MODELS, &list(&["gpt-4o"]), &list(&["gpt-4o"]))
            .finish();
        assert!(!report.needs_update());
    }

    #[test]
    fn test_budget_change_reports_values() {
        let report = Diff::new().check(BUDGET, &Some(100.0), &Some(150.0)).finish();
        assert!(report.needs_update());

        let change = report.field("max_budget").unwrap();
        assert_eq!(change.current, json!(100.0));
        assert_eq!(change.expected, json!(150.0));
        assert_eq!(change.to_string(), "max_budget: 100.0 -> 150.0");
    }

    #[test]
    fn test_zero_budget_is_not_empty() {
        let report = Diff::new().check(BUDGET, &None, &Some(0.0)).finish();
        assert!(report.needs_update());
    }

    #[test]
    fn test_informational_change_does_not_force_update() {
        let report = Diff::new().check(SPEND, &Some(1.5), &Some(0.0)).finish();
        assert!(!report.needs_update());
        assert_eq!(report.changed_fields(), vec!["spend"]);
    }

    #[test]
    fn test_unchanged_fields_are_still_listed() {
        let report = Diff::new()
            .check(BUDGET, &Some(10.0), &Some(10.0))
            .check(TAGS, &list(&["a"]), &list(&["b"]))
            .finish();
        assert_eq!(report.fields.len(), 2);
        assert_eq!(report.changed_fields(), vec!["tags"]);
    }

    #[test]
    fn test_cleared_fields() {
        let report = Diff::new()
            .check(BUDGET, &Some(100.0), &None)
            .check(TAGS, &list(&["x"]), &list(&["y"]))
            .finish();
        assert_eq!(report.cleared_fields(), vec!["max_budget"]);
    }

    #[test]
    fn test_value_emptiness() {
        let rule = FieldRule::equate_empty("metadata");
        let report = Diff::new()
            .check(rule, &Some(json!({})), &Some(Value::Null))
            .finish();
        assert!(!report.needs_update());
    }

    #[test]
    fn test_report_display() {
        let report = Diff::new().check(BUDGET, &Some(1.0), &Some(1.0)).finish();
        assert_eq!(report.to_string(), "no changes");
    }
}
