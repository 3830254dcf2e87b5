//! # Condition Projector
//!
//! Folds the outcome of one pass into the record's status and persists it,
//! at most once per pass and only when something observable changed.
//!
//! ```text
//! outcome                     Ready                        Deleting
//! ────────────────────────    ─────────────────────────    ──────────────────
//! in sync                     True  / Success              removed
//! failed (sync)               False / err.reason()         untouched
//! failed (deletion)           False / err.reason()         True / err.reason()
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};
use litellm_core::condition::{self, DELETING};
use litellm_core::{ConditionStatus, ConditionUpdate, RecordStatus, ResourceKind};
use litellm_plane::{ControlPlane, RawRecord};

/// What a pass wants the conditions to say.
#[derive(Debug)]
pub enum Outcome<'a> {
    /// The record is in sync.
    Ready(String),
    /// The sync path failed.
    Failed(&'a ReconcileError),
    /// The deletion path failed; the finalizer is kept.
    DeletionFailed(&'a ReconcileError),
}

/// Applies `outcome` to `status` in place.
pub fn apply<O>(status: &mut RecordStatus<O>, generation: i64, outcome: Outcome<'_>, now: DateTime<Utc>) {
    match outcome {
        Outcome::Ready(message) => {
            condition::set_condition(&mut status.conditions, ConditionUpdate::ready(message), now);
            condition::remove_condition(&mut status.conditions, DELETING);
        }
        Outcome::Failed(err) => {
            condition::set_condition(
                &mut status.conditions,
                ConditionUpdate::not_ready(err.reason(), err.to_string()),
                now,
            );
        }
        Outcome::DeletionFailed(err) => {
            condition::set_condition(
                &mut status.conditions,
                ConditionUpdate::not_ready(err.reason(), err.to_string()),
                now,
            );
            condition::set_condition(
                &mut status.conditions,
                ConditionUpdate {
                    type_: DELETING,
                    status: ConditionStatus::True,
                    reason: err.reason(),
                    message: err.to_string(),
                },
                now,
            );
        }
    }
    status.observed_generation = Some(generation);
}

/// Writes `status` if it differs from `previous`.
///
/// `current` is the latest copy of the record; its resource version guards
/// the write. Returns `true` if a write happened.
pub async fn persist<O>(
    plane: &dyn ControlPlane,
    kind: ResourceKind,
    current: &RawRecord,
    previous: &RecordStatus<O>,
    status: &RecordStatus<O>,
) -> ReconcileResult<bool>
where
    O: Serialize + PartialEq + Sync,
{
    if status == previous {
        debug!(kind = kind.kind, key = %current.key(), "Status unchanged, skipping write");
        return Ok(false);
    }

    let document = serde_json::to_value(status).map_err(|e| litellm_plane::PlaneError::Invalid {
        kind: kind.kind.to_string(),
        key: current.key().to_string(),
        reason: e.to_string(),
    })?;

    plane
        .write_status(
            kind,
            &current.key(),
            document,
            current.meta.resource_version.as_deref(),
        )
        .await?;
    Ok(true)
}

// =============================================================================
// Unit Tests
// =============================================================================
