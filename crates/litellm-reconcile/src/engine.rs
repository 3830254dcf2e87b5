//! # Synchronization Controller
//!
//! One generic reconcile pass, instantiated per kind through an
//! [`EntityAdapter`].
//!
//! ## Pass
//! ```text
//! load record ──► absent ──────────────────────────────────────► Gone
//!     │
//! derive lifecycle state
//!     ├── DeletionInProgress ──► finalizer lifecycle ──────────► Deleted
//!     │
//!     ▼ NoRemote | RemotePresent
//! project request            (InvalidSpec before any remote call)
//!     │
//! resolve connection          (cached per connection source)
//!     │
//! locate remote entity
//!     ├── RemotePresent, found ───────────────────┐
//!     ├── RemotePresent, gone ──► DuplicateAlias | RemoteEntityMissing
//!     ├── NoRemote, found, owned ──► adopt ───────┤
//!     ├── NoRemote, found, unmarked or foreign    │
//!     │       ──► DuplicateAlias                  │
//!     └── NoRemote, absent                        │
//!             │                                   ▼
//!       add finalizer                   add finalizer, diff
//!       create                          update + re-read if drifted
//!       store key secret                ensure key secret
//!             │                                   │
//!             └──────────────┬────────────────────┘
//!                            ▼
//!          Condition Projector (one status write, skipped if unchanged)
//! ```
//!
//! Memberships carry no owner marker; one found by natural key is adopted.
//!
//! A pass cut short by the dispatcher's deadline is surfaced through
//! [`Reconciler::record_failure`].

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapter::{EntityAdapter, RecordOf};
use crate::connection::{ConnectionCache, ConnectionResolver};
use crate::error::{ReconcileError, ReconcileResult};
use crate::finalizer;
use crate::projector::{self, Outcome};
use crate::secrets::{self, SecretState};
use litellm_client::GatewayClient;
use litellm_core::{
    ConnectionSource, DeletionPlan, LifecycleState, ObjectKey, Ownership, Record, RecordStatus,
    ResourceKind, Sensitive, SpecError,
};
use litellm_plane::{ControlPlane, PlaneError, RawRecord};

/// How a pass ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The remote entity matches the spec.
    Synced,
    /// Deletion finished; the finalizer is released.
    Deleted,
    /// The record no longer exists.
    Gone,
}

/// A kind-erased controller, as driven by the dispatcher.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    fn kind(&self) -> ResourceKind;

    /// Runs one pass for `key`.
    async fn reconcile(&self, key: &ObjectKey, cache: &ConnectionCache) -> ReconcileResult<PassOutcome>;

    /// Records a failure that ended a pass from outside, such as its deadline.
    async fn record_failure(&self, _key: &ObjectKey, _err: &ReconcileError) -> ReconcileResult<()> {
        Ok(())
    }
}

/// Generic synchronization controller for one kind.
pub struct Controller<A: EntityAdapter> {
    adapter: A,
    plane: Arc<dyn ControlPlane>,
    resolver: Arc<ConnectionResolver>,
}

impl<A: EntityAdapter> Controller<A> {
    pub fn new(adapter: A, plane: Arc<dyn ControlPlane>, resolver: Arc<ConnectionResolver>) -> Self {
        Controller {
            adapter,
            plane,
            resolver,
        }
    }

    // =========================================================================
    // Sync Path
    // =========================================================================

    async fn sync(
        &self,
        mut current: RawRecord,
        record: RecordOf<A>,
        state: LifecycleState,
        cache: &ConnectionCache,
    ) -> ReconcileResult<PassOutcome> {
        let mut status = record.status.clone();
        let result = self
            .sync_remote(&mut current, &record, state, &mut status, cache)
            .await;

        let outcome = match &result {
            Ok(message) => Outcome::Ready(message.clone()),
            Err(err) => {
                self.log_failure(&record, err);
                self.invalidate_on_auth_failure(&record, err, cache);
                Outcome::Failed(err)
            }
        };
        projector::apply(&mut status, record.meta.generation, outcome, Utc::now());

        let written = projector::persist(&*self.plane, A::KIND, &current, &record.status, &status).await;
        match (result, written) {
            (Ok(_), Ok(_)) => Ok(PassOutcome::Synced),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(write_err)) => {
                warn!(
                    kind = A::KIND.kind,
                    key = %record.key(),
                    error = %write_err,
                    "Failed to record failure in status"
                );
                Err(err)
            }
        }
    }

    /// Brings the remote entity in line. Returns the `Ready` message.
    async fn sync_remote(
        &self,
        current: &mut RawRecord,
        record: &RecordOf<A>,
        state: LifecycleState,
        status: &mut RecordStatus<A::Observed>,
        cache: &ConnectionCache,
    ) -> ReconcileResult<String> {
        let key = record.key();
        let natural_key = A::natural_key(&record.spec);

        let request = self.adapter.project(&*self.plane, record).await?;
        let source = A::connection_ref(&record.spec).source(&record.meta.namespace)?;
        let gw = cache.client(&self.resolver, &source).await?;
        let secret_name = A::key_secret(&record.spec, &source);

        let existing = self.locate(&gw, record, state, &natural_key).await?;

        let (remote, material) = match existing {
            None => {
                if let Some(name) = &secret_name {
                    let found = secrets::check(&*self.plane, &record.meta, name).await?;
                    if let Some(err) = secrets::unusable(&record.meta, name, found) {
                        return Err(err);
                    }
                }

                finalizer::ensure(&*self.plane, A::KIND, current).await?;
                let created = self.adapter.create(&gw, &request).await?;
                let remote_id = A::remote_id(&created.remote);
                info!(kind = A::KIND.kind, %key, %natural_key, %remote_id, "Created remote entity");

                status.remote_id = Some(remote_id);
                status.observed = A::observe(&created.remote);
                (created.remote, created.key_material)
            }
            Some(remote) => {
                finalizer::ensure(&*self.plane, A::KIND, current).await?;
                let remote_id = A::remote_id(&remote);
                let report = A::diff(&remote, &request);

                let remote = if report.needs_update() {
                    info!(
                        kind = A::KIND.kind,
                        %key,
                        %remote_id,
                        changes = %report,
                        "Remote entity drifted, updating"
                    );
                    self.adapter.update(&gw, &remote, &request, &report).await?;
                    self.adapter
                        .get(&gw, &remote_id)
                        .await?
                        .ok_or_else(|| ReconcileError::RemoteEntityMissing {
                            remote_id: remote_id.clone(),
                        })?
                } else {
                    debug!(kind = A::KIND.kind, %key, %remote_id, "Remote entity in sync");
                    remote
                };

                status.remote_id = Some(remote_id);
                status.observed = A::observe(&remote);
                (remote, None)
            }
        };

        if let Some(name) = secret_name {
            self.ensure_secret(&gw, record, status, &name, &remote, material)
                .await?;
        }

        Ok(format!("{} {} is in sync", A::KIND.kind, natural_key))
    }

    /// Finds the remote entity behind the record.
    async fn locate(
        &self,
        gw: &GatewayClient,
        record: &RecordOf<A>,
        state: LifecycleState,
        natural_key: &str,
    ) -> ReconcileResult<Option<A::Remote>> {
        let uid = record.meta.uid.as_str();

        if let (LifecycleState::RemotePresent, Some(recorded)) = (state, record.remote_id()) {
            if let Some(remote) = self.adapter.get(gw, recorded).await? {
                return Ok(Some(remote));
            }

            // Never recreate a recorded entity.
            return match self.adapter.find(gw, &record.spec, uid).await? {
                Some(other) if A::remote_id(&other) != recorded => Err(ReconcileError::DuplicateAlias {
                    natural_key: natural_key.to_string(),
                    remote_id: A::remote_id(&other),
                }),
                _ => Err(ReconcileError::RemoteEntityMissing {
                    remote_id: recorded.to_string(),
                }),
            };
        }

        let Some(remote) = self.adapter.find(gw, &record.spec, uid).await? else {
            return Ok(None);
        };
        let remote_id = A::remote_id(&remote);
        match A::ownership(&remote, uid) {
            Ownership::Owned | Ownership::Unknown => {
                info!(
                    kind = A::KIND.kind,
                    key = %record.key(),
                    %natural_key,
                    %remote_id,
                    "Adopting existing remote entity"
                );
                Ok(Some(remote))
            }
            Ownership::Foreign => Err(ReconcileError::DuplicateAlias {
                natural_key: natural_key.to_string(),
                remote_id,
            }),
        }
    }

    /// Makes sure the record's key secret exists.
    async fn ensure_secret(
        &self,
        gw: &GatewayClient,
        record: &RecordOf<A>,
        status: &mut RecordStatus<A::Observed>,
        name: &str,
        remote: &A::Remote,
        material: Option<Sensitive>,
    ) -> ReconcileResult<()> {
        let found = secrets::check(&*self.plane, &record.meta, name).await?;
        if let Some(err) = secrets::unusable(&record.meta, name, found) {
            return Err(err);
        }

        if found == SecretState::Missing {
            let material = match material {
                Some(material) => material,
                None => {
                    let reissued = self.adapter.reissue(gw, remote, &record.meta.uid).await?;
                    info!(
                        kind = A::KIND.kind,
                        key = %record.key(),
                        secret = name,
                        "Re-issued key material for missing secret"
                    );
                    if let Some(remote_id) = reissued.remote_id {
                        status.remote_id = Some(remote_id);
                    }
                    reissued.key_material
                }
            };
            secrets::store(&*self.plane, A::KIND, &record.meta, name, &material).await?;
        }

        status.key_secret_ref = Some(name.to_string());
        Ok(())
    }

    // =========================================================================
    // Deletion Path
    // =========================================================================

    async fn finalize(
        &self,
        current: RawRecord,
        record: RecordOf<A>,
        plan: DeletionPlan,
        cache: &ConnectionCache,
    ) -> ReconcileResult<PassOutcome> {
        let result = self.delete_remote(&record, &plan, cache).await;

        if let Err(err) = result {
            self.log_failure(&record, &err);
            self.invalidate_on_auth_failure(&record, &err, cache);

            let mut status = record.status.clone();
            projector::apply(
                &mut status,
                record.meta.generation,
                Outcome::DeletionFailed(&err),
                Utc::now(),
            );
            if let Err(write_err) =
                projector::persist(&*self.plane, A::KIND, &current, &record.status, &status).await
            {
                warn!(
                    kind = A::KIND.kind,
                    key = %record.key(),
                    error = %write_err,
                    "Failed to record deletion failure in status"
                );
            }
            return Err(err);
        }

        match finalizer::release(&*self.plane, A::KIND, &current).await? {
            None => info!(kind = A::KIND.kind, key = %record.key(), "Finalizer released, record removed"),
            Some(_) => info!(kind = A::KIND.kind, key = %record.key(), "Finalizer released"),
        }
        Ok(PassOutcome::Deleted)
    }

    async fn delete_remote(
        &self,
        record: &RecordOf<A>,
        plan: &DeletionPlan,
        cache: &ConnectionCache,
    ) -> ReconcileResult<()> {
        let source = A::connection_ref(&record.spec).source(&record.meta.namespace)?;
        let gw = cache.client(&self.resolver, &source).await?;
        finalizer::delete_remote(&self.adapter, &gw, plan, &record.spec, &record.meta.uid).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn connection_source(record: &RecordOf<A>) -> Option<ConnectionSource> {
        A::connection_ref(&record.spec)
            .source(&record.meta.namespace)
            .ok()
    }

    fn invalidate_on_auth_failure(&self, record: &RecordOf<A>, err: &ReconcileError, cache: &ConnectionCache) {
        if err.is_auth_failure() {
            if let Some(source) = Self::connection_source(record) {
                cache.invalidate(&source);
            }
        }
    }

    fn log_failure(&self, record: &RecordOf<A>, err: &ReconcileError) {
        if err.is_retryable() {
            warn!(
                kind = A::KIND.kind,
                key = %record.key(),
                reason = %err.reason(),
                error = %err,
                "Reconcile failed, will retry"
            );
        } else {
            warn!(
                kind = A::KIND.kind,
                key = %record.key(),
                reason = %err.reason(),
                error = %err,
                "Reconcile failed, waiting for spec change"
            );
        }
    }

    fn decode_status(&self, current: &RawRecord) -> ReconcileResult<RecordStatus<A::Observed>> {
        current.decode_status().map_err(|e| {
            ReconcileError::Plane(PlaneError::Invalid {
                kind: A::KIND.kind.to_string(),
                key: current.key().to_string(),
                reason: format!("status could not be decoded: {}", e),
            })
        })
    }

    /// Records an undecodable spec and returns the terminal error.
    async fn reject_spec(
        &self,
        current: &RawRecord,
        previous: &RecordStatus<A::Observed>,
        err: serde_json::Error,
    ) -> ReconcileResult<PassOutcome> {
        let err = ReconcileError::InvalidSpec(SpecError::Decode(err.to_string()));
        warn!(kind = A::KIND.kind, key = %current.key(), error = %err, "Spec could not be decoded");

        let mut status = previous.clone();
        projector::apply(&mut status, current.meta.generation, Outcome::Failed(&err), Utc::now());
        projector::persist(&*self.plane, A::KIND, current, previous, &status).await?;
        Err(err)
    }
}

#[async_trait]
impl<A: EntityAdapter> Reconciler for Controller<A> {
    fn kind(&self) -> ResourceKind {
        A::KIND
    }

    async fn reconcile(&self, key: &ObjectKey, cache: &ConnectionCache) -> ReconcileResult<PassOutcome> {
        let Some(current) = self.plane.get(A::KIND, key).await? else {
            debug!(kind = A::KIND.kind, %key, "Record no longer exists");
            return Ok(PassOutcome::Gone);
        };

        let status = self.decode_status(&current)?;

        let state = LifecycleState::derive(current.meta.deletion_requested, status.remote_id.is_some());
        let plan = match state {
            LifecycleState::DeletionInProgress => {
                let plan = DeletionPlan::plan(&current.meta, &A::KIND.finalizer(), status.remote_id.as_deref());
                if plan == DeletionPlan::Skip {
                    debug!(kind = A::KIND.kind, %key, "Deletion requested without finalizer, nothing to do");
                    return Ok(PassOutcome::Deleted);
                }
                Some(plan)
            }
            LifecycleState::NoRemote | LifecycleState::RemotePresent => None,
        };

        let spec: A::Spec = match current.decode_spec() {
            Ok(spec) => spec,
            Err(err) => return self.reject_spec(&current, &status, err).await,
        };
        let record = Record {
            meta: current.meta.clone(),
            spec,
            status,
        };

        match plan {
            Some(plan) => self.finalize(current, record, plan, cache).await,
            None => self.sync(current, record, state, cache).await,
        }
    }

    async fn record_failure(&self, key: &ObjectKey, err: &ReconcileError) -> ReconcileResult<()> {
        let Some(current) = self.plane.get(A::KIND, key).await? else {
            return Ok(());
        };
        let previous: RecordStatus<A::Observed> = self.decode_status(&current)?;

        let outcome = if current.meta.deletion_requested {
            Outcome::DeletionFailed(err)
        } else {
            Outcome::Failed(err)
        };
        let mut status = previous.clone();
        projector::apply(&mut status, current.meta.generation, outcome, Utc::now());
        projector::persist(&*self.plane, A::KIND, &current, &previous, &status).await?;
        Ok(())
    }
}
