//! # Conditions
//!
//! The status vocabulary every record exposes.
//!
//! ## Condition Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  conditions:                                                            │
//! │    - type: Ready              ◄── exactly one, always authoritative     │
//! │      status: "False"                                                    │
//! │      reason: DuplicateAlias   ◄── drawn from Reason                     │
//! │      message: team alias 'team-a' already belongs to team_id 'x'        │
//! │      lastTransitionTime: 2024-05-01T12:00:00Z                           │
//! │    - type: Deleting           ◄── transient, only while delete fails    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `lastTransitionTime` only moves when `status` flips. Rewriting an identical
//! condition is reported as "unchanged" so the caller can skip the status write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of the authoritative condition.
pub const READY: &str = "Ready";

/// Transient condition present while a remote delete keeps failing.
pub const DELETING: &str = "Deleting";

// =============================================================================
// Condition Status
// =============================================================================

/// Tri-state condition status, serialized as `"True"`, `"False"`, `"Unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn from_bool(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Reason Taxonomy
// =============================================================================

/// Reason codes surfaced on conditions.
///
/// Every `Ready=False` carries one of the failure reasons below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// The record is in sync with the gateway.
    Success,
    /// Credential or endpoint resolution failed.
    ConnectionError,
    /// Local validation or parsing failed. No remote call was made.
    InvalidSpec,
    /// The gateway rejected a call.
    LitellmError,
    /// The natural key resolves to a remote entity this record does not own.
    DuplicateAlias,
    /// A recorded remote id no longer resolves. Used for every kind.
    RemoteModelMissing,
    /// The remote delete failed; the finalizer is retained.
    DeleteFailed,
    /// Persisting generated key material failed after the remote create.
    SecretCreateFailed,
}

impl Reason {
    /// Returns the wire form of the reason.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Reason::Success => "Success",
            Reason::ConnectionError => "ConnectionError",
            Reason::InvalidSpec => "InvalidSpec",
            Reason::LitellmError => "LitellmError",
            Reason::DuplicateAlias => "DuplicateAlias",
            Reason::RemoteModelMissing => "RemoteModelMissing",
            Reason::DeleteFailed => "DeleteFailed",
            Reason::SecretCreateFailed => "SecretCreateFailed",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Condition
// =============================================================================

/// A typed, timestamped status fact attached to a record.
///
/// `reason` is kept as a plain string so conditions written by other
/// tooling decode without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Returns true if this condition has the same observable content as
    /// `update`, ignoring timestamps.
    fn matches(&self, update: &ConditionUpdate) -> bool {
        self.status == update.status
            && self.reason == update.reason.as_str()
            && self.message == update.message
    }
}

/// A condition to be set, without a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionUpdate {
    pub type_: &'static str,
    pub status: ConditionStatus,
    pub reason: Reason,
    pub message: String,
}

impl ConditionUpdate {
    /// `Ready=True` with reason `Success`.
    pub fn ready(message: impl Into<String>) -> Self {
        ConditionUpdate {
            type_: READY,
            status: ConditionStatus::True,
            reason: Reason::Success,
            message: message.into(),
        }
    }

    /// `Ready=False` with the given failure reason.
    pub fn not_ready(reason: Reason, message: impl Into<String>) -> Self {
        ConditionUpdate {
            type_: READY,
            status: ConditionStatus::False,
            reason,
            message: message.into(),
        }
    }
}

// =============================================================================
// Condition List Operations
// =============================================================================

/// Sets a condition in the list.
///
/// ## Rules
/// - A missing condition of that type is appended
/// - An existing one is replaced; `lastTransitionTime` is kept unless `status` changed
/// - Returns `false` if the list was left untouched (identical content)
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    update: ConditionUpdate,
    now: DateTime<Utc>,
) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == update.type_) {
        Some(existing) if existing.matches(&update) => false,
        Some(existing) => {
            if existing.status != update.status {
                existing.last_transition_time = now;
            }
            existing.status = update.status;
            existing.reason = update.reason.as_str().to_string();
            existing.message = update.message;
            true
        }
        None => {
            conditions.push(Condition {
                type_: update.type_.to_string(),
                status: update.status,
                reason: update.reason.as_str().to_string(),
                message: update.message,
                last_transition_time: now,
            });
            true
        }
    }
}

/// Removes every condition of the given type. Returns `true` if one was removed.
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.type_ != type_);
    conditions.len() != before
}

/// Finds a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_append_new_condition() {
        let mut conditions = Vec::new();
        assert!(set_condition(&mut conditions, ConditionUpdate::ready("ok"), t(10)));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason, "Success");
        assert_eq!(conditions[0].last_transition_time, t(10));
    }

    #[test]
    fn test_identical_update_is_unchanged() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ConditionUpdate::ready("ok"), t(10));
        assert!(!set_condition(&mut conditions, ConditionUpdate::ready("ok"), t(20)));
        assert_eq!(conditions[0].last_transition_time, t(10));
    }

    #[test]
    fn test_message_change_keeps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            ConditionUpdate::not_ready(Reason::LitellmError, "boom"),
            t(10),
        );
        assert!(set_condition(
            &mut conditions,
            ConditionUpdate::not_ready(Reason::ConnectionError, "no secret"),
            t(20),
        ));
        assert_eq!(conditions[0].reason, "ConnectionError");
        assert_eq!(conditions[0].last_transition_time, t(10));
    }

    #[test]
    fn test_status_flip_moves_transition_time() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            ConditionUpdate::not_ready(Reason::InvalidSpec, "bad"),
            t(10),
        );
        set_condition(&mut conditions, ConditionUpdate::ready("ok"), t(30));
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].last_transition_time, t(30));
    }

    #[test]
    fn test_remove_and_find() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ConditionUpdate::ready("ok"), t(1));
        set_condition(
            &mut conditions,
            ConditionUpdate {
                type_: DELETING,
                status: ConditionStatus::True,
                reason: Reason::DeleteFailed,
                message: "500".to_string(),
            },
            t(1),
        );
        assert!(find_condition(&conditions, DELETING).is_some());
        assert!(remove_condition(&mut conditions, DELETING));
        assert!(!remove_condition(&mut conditions, DELETING));
        assert!(find_condition(&conditions, READY).is_some());
    }

    #[test]
    fn test_wire_format() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ConditionUpdate::ready("ok"), t(0));
        let json = serde_json::to_value(&conditions[0]).unwrap();
        assert_eq!(json["type"], "Ready");
        assert_eq!(json["status"], "True");
        assert_eq!(json["lastTransitionTime"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_reason_codes() {
        let codes: Vec<_> = [
            Reason::Success,
            Reason::ConnectionError,
            Reason::InvalidSpec,
            Reason::LitellmError,
            Reason::DuplicateAlias,
            Reason::RemoteModelMissing,
            Reason::DeleteFailed,
            Reason::SecretCreateFailed,
        ]
        .iter()
        .map(Reason::as_str)
        .collect();

        assert_eq!(
            codes,
            [
                "Success",
                "ConnectionError",
                "InvalidSpec",
                "LitellmError",
                "DuplicateAlias",
                "RemoteModelMissing",
                "DeleteFailed",
                "SecretCreateFailed",
            ]
        );
    }
}
