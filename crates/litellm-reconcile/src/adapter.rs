//! # Entity Adapters
//!
//! The capability set one kind plugs into the generic [`Controller`].
//! Everything kind-specific lives behind this trait: how a spec becomes a
//! request, how the remote entity is found, created, updated and deleted,
//! and what of it is mirrored into status.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Controller<A>                        A: EntityAdapter                  │
//! │                                                                         │
//! │  project ──► Request                  (local, may read the plane)       │
//! │  get / find ──► Option<Remote>        (by id / by natural key)          │
//! │  create / update / delete             (gateway mutations)               │
//! │  diff ──► DiffReport                  (pure, from litellm-core)         │
//! │  observe ──► Observed                 (mirrored into status)            │
//! │  key_secret / reissue                 (kinds that produce key material) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Controller`]: crate::engine::Controller

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::GatewayClient;
use litellm_core::{ConnectionRef, ConnectionSource, DiffReport, Ownership, Record, ResourceKind, Sensitive};
use litellm_plane::ControlPlane;

/// A typed record of adapter `A`.
pub type RecordOf<A> = Record<<A as EntityAdapter>::Spec, <A as EntityAdapter>::Observed>;

/// Result of a remote create.
#[derive(Debug)]
pub struct Created<R> {
    pub remote: R,
    /// Key material returned once by the gateway, if the kind produces any.
    pub key_material: Option<Sensitive>,
}

impl<R> Created<R> {
    pub fn without_key(remote: R) -> Self {
        Created {
            remote,
            key_material: None,
        }
    }
}

/// Fresh key material for an existing entity.
#[derive(Debug)]
pub struct Reissued {
    pub key_material: Sensitive,
    /// Set when re-issuing changed the entity's remote id.
    pub remote_id: Option<String>,
}

#[async_trait]
pub trait EntityAdapter: Send + Sync + 'static {
    type Spec: DeserializeOwned + Send + Sync;
    type Request: Send + Sync;
    type Remote: Send + Sync;
    type Observed: Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + Sync;

    const KIND: ResourceKind;

    fn connection_ref(spec: &Self::Spec) -> &ConnectionRef;

    /// Human-readable natural key, used in messages and conflicts.
    fn natural_key(spec: &Self::Spec) -> String;

    /// Projects the record into a gateway request. No gateway calls.
    async fn project(
        &self,
        plane: &dyn ControlPlane,
        record: &RecordOf<Self>,
    ) -> ReconcileResult<Self::Request>;

    /// Reads the entity by remote id.
    async fn get(&self, gw: &GatewayClient, remote_id: &str) -> ReconcileResult<Option<Self::Remote>>;

    /// Looks the entity up by natural key.
    async fn find(
        &self,
        gw: &GatewayClient,
        spec: &Self::Spec,
        uid: &str,
    ) -> ReconcileResult<Option<Self::Remote>>;

    fn remote_id(remote: &Self::Remote) -> String;

    fn ownership(remote: &Self::Remote, uid: &str) -> Ownership;

    async fn create(
        &self,
        gw: &GatewayClient,
        request: &Self::Request,
    ) -> ReconcileResult<Created<Self::Remote>>;

    fn diff(remote: &Self::Remote, request: &Self::Request) -> DiffReport;

    /// Applies the changes in `report`.
    async fn update(
        &self,
        gw: &GatewayClient,
        remote: &Self::Remote,
        request: &Self::Request,
        report: &DiffReport,
    ) -> ReconcileResult<()>;

    /// Deletes the entity. An already-absent entity is success.
    async fn delete(&self, gw: &GatewayClient, remote_id: &str) -> ReconcileResult<()>;

    fn observe(remote: &Self::Remote) -> Self::Observed;

    /// Name of the secret holding this record's key material, if it has one.
    fn key_secret(_spec: &Self::Spec, _source: &ConnectionSource) -> Option<String> {
        None
    }

    /// Issues new key material when the stored copy was lost.
    async fn reissue(
        &self,
        _gw: &GatewayClient,
        remote: &Self::Remote,
        _uid: &str,
    ) -> ReconcileResult<Reissued> {
        Err(ReconcileError::SecretCreateFailed {
            secret: Self::remote_id(remote),
            reason: format!("{} does not produce key material", Self::KIND.kind),
        })
    }
}
