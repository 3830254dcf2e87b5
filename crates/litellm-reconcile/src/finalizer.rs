//! # Finalizer Lifecycle
//!
//! Two-phase deletion of the remote entity behind a record.
//!
//! ```text
//! deletion requested
//!     │
//!     ├── finalizer absent ───────────────────────────► done (nothing remote)
//!     │
//!     ├── phase 1: remote delete
//!     │     DeleteById(id)         delete id; not-found = success
//!     │     DeleteByNaturalKey     find; delete only if owned
//!     │     failure ──► DeleteFailed, finalizer kept, retried
//!     │
//!     └── phase 2: remove finalizer ──► control plane removes the record
//! ```
//!
//! The finalizer is added before the first remote create, so an entity can
//! never exist remotely without its record holding the finalizer.

use tracing::{info, warn};

use crate::adapter::EntityAdapter;
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::GatewayClient;
use litellm_core::lifecycle::{add_finalizer, remove_finalizer};
use litellm_core::{DeletionPlan, Ownership, ResourceKind};
use litellm_plane::{ControlPlane, PlaneError, RawRecord};

/// Adds the kind's finalizer. `current` is refreshed when a write happened.
pub async fn ensure(
    plane: &dyn ControlPlane,
    kind: ResourceKind,
    current: &mut RawRecord,
) -> ReconcileResult<bool> {
    let mut finalizers = current.meta.finalizers.clone();
    if !add_finalizer(&mut finalizers, &kind.finalizer()) {
        return Ok(false);
    }

    let key = current.key();
    let updated = plane
        .set_finalizers(kind, &key, finalizers, current.meta.resource_version.as_deref())
        .await?
        .ok_or_else(|| PlaneError::not_found(kind.kind, &key))?;
    *current = updated;
    Ok(true)
}

/// Removes the kind's finalizer.
///
/// Returns `None` if the control plane removed the record as a result.
pub async fn release(
    plane: &dyn ControlPlane,
    kind: ResourceKind,
    current: &RawRecord,
) -> ReconcileResult<Option<RawRecord>> {
    let mut finalizers = current.meta.finalizers.clone();
    if !remove_finalizer(&mut finalizers, &kind.finalizer()) {
        return Ok(Some(current.clone()));
    }

    Ok(plane
        .set_finalizers(
            kind,
            &current.key(),
            finalizers,
            current.meta.resource_version.as_deref(),
        )
        .await?)
}

/// Phase 1: removes the remote entity according to `plan`.
pub async fn delete_remote<A: EntityAdapter>(
    adapter: &A,
    gw: &GatewayClient,
    plan: &DeletionPlan,
    spec: &A::Spec,
    uid: &str,
) -> ReconcileResult<()> {
    match plan {
        DeletionPlan::Skip => Ok(()),
        DeletionPlan::DeleteById(remote_id) => delete_id(adapter, gw, remote_id).await,
        DeletionPlan::DeleteByNaturalKey => {
            let natural_key = A::natural_key(spec);
            let Some(remote) = adapter.find(gw, spec, uid).await? else {
                return Ok(());
            };

            let remote_id = A::remote_id(&remote);
            match A::ownership(&remote, uid) {
                Ownership::Owned | Ownership::Unknown => delete_id(adapter, gw, &remote_id).await,
                Ownership::Foreign => {
                    warn!(
                        kind = A::KIND.kind,
                        %natural_key,
                        %remote_id,
                        "Not deleting remote entity owned by someone else"
                    );
                    Ok(())
                }
            }
        }
    }
}

async fn delete_id<A: EntityAdapter>(adapter: &A, gw: &GatewayClient, remote_id: &str) -> ReconcileResult<()> {
    match adapter.delete(gw, remote_id).await {
        Ok(()) => {
            info!(kind = A::KIND.kind, %remote_id, "Deleted remote entity");
            Ok(())
        }
        Err(ReconcileError::Gateway { source, .. }) => Err(ReconcileError::DeleteFailed {
            remote_id: remote_id.to_string(),
            source,
        }),
        Err(other) => Err(other),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
