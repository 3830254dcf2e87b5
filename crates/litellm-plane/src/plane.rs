//! # Control Plane Trait
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Reconcile pass                                                         │
//! │       │  plane.get(TEAM, &key)                                          │
//! │       ▼                                                                 │
//! │  ControlPlane                                                           │
//! │  ├── get / get_secret                    (reads)                        │
//! │  ├── set_finalizers                      (metadata, optimistic)         │
//! │  ├── write_status                        (status sub-resource)          │
//! │  └── create_secret                       (owner-referenced)             │
//! │       │                                                                 │
//! │       ├──► KubePlane         (apps/operator)                            │
//! │       └──► MemoryControlPlane (tests, this crate)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes carry the resource version of the read they are based on; a stale
//! version yields [`PlaneError::Conflict`](crate::PlaneError::Conflict).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlaneResult;
use crate::record::RawRecord;
use crate::secret::{NewSecret, Secret};
use litellm_core::{ObjectKey, ResourceKind};

/// Access to desired records, their status and secrets.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Reads a record. `Ok(None)` if it does not exist.
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> PlaneResult<Option<RawRecord>>;

    /// Replaces the record's finalizer list.
    ///
    /// When deletion was requested and the list becomes empty, the record is
    /// removed and `Ok(None)` is returned.
    async fn set_finalizers(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
        finalizers: Vec<String>,
        resource_version: Option<&str>,
    ) -> PlaneResult<Option<RawRecord>>;

    /// Replaces the status sub-resource.
    async fn write_status(
        &self,
        kind: ResourceKind,
        key: &ObjectKey,
        status: Value,
        resource_version: Option<&str>,
    ) -> PlaneResult<RawRecord>;

    /// Reads a secret. `Ok(None)` if it does not exist.
    async fn get_secret(&self, key: &ObjectKey) -> PlaneResult<Option<Secret>>;

    /// Creates a secret. Fails with `AlreadyExists` if the name is taken.
    async fn create_secret(&self, secret: NewSecret) -> PlaneResult<()>;
}
