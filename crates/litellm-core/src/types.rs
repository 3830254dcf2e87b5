//! # Record Types
//!
//! The envelope shared by every desired record kind, plus the connection
//! reference and resource-kind descriptors.
//!
//! ## Record Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Record<Spec, Observed>                           │
//! │                                                                         │
//! │  meta    ── name, namespace, uid, generation, resourceVersion,          │
//! │             deletionRequested, finalizers                               │
//! │                                                                         │
//! │  spec    ── user-authored intent (kind specific, see kinds/)            │
//! │             └── connectionRef: secretRef | instanceRef                  │
//! │                                                                         │
//! │  status  ── RecordStatus<Observed>                                      │
//! │             ├── remoteId        (never reassigned once observed)        │
//! │             ├── <Observed>      (spend, effective limits, ...)          │
//! │             ├── keySecretRef    (generated secret, when the kind has one)│
//! │             ├── conditions[]    (Ready + transient types)               │
//! │             └── observedGeneration                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::condition::Condition;

// =============================================================================
// Object Key
// =============================================================================

/// Identity of a desired record within its kind: namespace plus name.
///
/// This is the key the dispatcher serializes work on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Creates a new key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// Resource Kind
// =============================================================================

/// Static descriptor of a record kind in the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// API group, e.g. `auth.litellm.ai`.
    pub group: &'static str,
    /// API version, e.g. `v1alpha1`.
    pub version: &'static str,
    /// Kind name, e.g. `Team`.
    pub kind: &'static str,
    /// Plural resource name, e.g. `teams`.
    pub plural: &'static str,
}

impl ResourceKind {
    /// Returns `group/version`.
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Returns the cleanup marker name for this kind.
    ///
    /// ## Example
    /// ```rust
    /// use litellm_core::types::TEAM;
    ///
    /// assert_eq!(TEAM.finalizer(), "teams.auth.litellm.ai/finalizer");
    /// ```
    pub fn finalizer(&self) -> String {
        format!("{}.{}/finalizer", self.plural, self.group)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind)
    }
}

const AUTH_GROUP: &str = "auth.litellm.ai";
const GATEWAY_GROUP: &str = "litellm.litellm.ai";
const VERSION: &str = "v1alpha1";

/// Gateway user accounts.
pub const ACCOUNT: ResourceKind = ResourceKind {
    group: AUTH_GROUP,
    version: VERSION,
    kind: "User",
    plural: "users",
};

/// Gateway teams.
pub const TEAM: ResourceKind = ResourceKind {
    group: AUTH_GROUP,
    version: VERSION,
    kind: "Team",
    plural: "teams",
};

/// Gateway virtual API keys.
pub const API_KEY: ResourceKind = ResourceKind {
    group: AUTH_GROUP,
    version: VERSION,
    kind: "VirtualKey",
    plural: "virtualkeys",
};

/// Team membership of a user.
pub const TEAM_MEMBERSHIP: ResourceKind = ResourceKind {
    group: AUTH_GROUP,
    version: VERSION,
    kind: "TeamMemberAssociation",
    plural: "teammemberassociations",
};

/// Model registrations on the gateway.
pub const MODEL: ResourceKind = ResourceKind {
    group: GATEWAY_GROUP,
    version: VERSION,
    kind: "Model",
    plural: "models",
};

/// Gateway deployment records that own a master-key secret.
///
/// Only read (for instance-pointer connection resolution), never reconciled here.
pub const INSTANCE: ResourceKind = ResourceKind {
    group: GATEWAY_GROUP,
    version: VERSION,
    kind: "LiteLLMInstance",
    plural: "litellminstances",
};

/// Every kind this operator reconciles.
pub const RECONCILED_KINDS: [ResourceKind; 5] = [ACCOUNT, TEAM, API_KEY, TEAM_MEMBERSHIP, MODEL];

// =============================================================================
// Record Metadata
// =============================================================================

/// Control-plane metadata of a desired record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub name: String,
    pub namespace: String,

    /// Control-plane assigned unique id; stable for the record's lifetime.
    pub uid: String,

    /// Incremented by the control plane on every spec change.
    #[serde(default)]
    pub generation: i64,

    /// Optimistic-concurrency token; writes carrying a stale value are rejected.
    #[serde(default)]
    pub resource_version: Option<String>,

    /// Whether deletion of the record has been requested.
    #[serde(default)]
    pub deletion_requested: bool,

    #[serde(default)]
    pub finalizers: Vec<String>,
}

impl RecordMeta {
    /// Returns the record's key.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Returns true if the named finalizer is present.
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }
}

// =============================================================================
// Record Status
// =============================================================================

/// Last-observed remote projection of a record.
///
/// `O` is the kind-specific observed data; it is flattened into the same
/// status document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatus<O> {
    /// The gateway's id for the entity. Once set it is never reassigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    #[serde(flatten)]
    pub observed: O,

    /// Name of the secret holding generated key material, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_secret_ref: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// =============================================================================
// Record
// =============================================================================

/// A typed desired record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<S, O> {
    pub meta: RecordMeta,
    pub spec: S,
    pub status: RecordStatus<O>,
}

impl<S, O> Record<S, O> {
    /// Returns the record's key.
    pub fn key(&self) -> ObjectKey {
        self.meta.key()
    }

    /// Returns the recorded remote id, if any.
    pub fn remote_id(&self) -> Option<&str> {
        self.status.remote_id.as_deref()
    }
}

// =============================================================================
// Connection Reference
// =============================================================================

/// Indirect pointer to the gateway endpoint and master credential.
///
/// Exactly one of the two forms must be set; see [`ConnectionRef::source`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretConnectionRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ref: Option<InstanceConnectionRef>,
}

/// Explicit credential secret holding both the master key and the endpoint URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretConnectionRef {
    pub name: String,

    /// Defaults to the record's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Key names inside the secret; conventional names are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<ConnectionKeys>,
}

/// Key names inside a connection secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Pointer to a gateway instance record that owns a credential secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConnectionRef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Default key holding the master credential in a connection secret.
pub const DEFAULT_MASTER_KEY_FIELD: &str = "masterkey";

/// Default key holding the endpoint URL in a connection secret.
pub const DEFAULT_URL_FIELD: &str = "url";

/// A validated, namespace-resolved connection reference.
///
/// Hashable so it can key the per-kind connection cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionSource {
    /// Read master key and URL from an explicit secret.
    Secret {
        namespace: String,
        name: String,
        master_key_field: String,
        url_field: String,
    },
    /// Derive secret name and service address from an instance record.
    Instance { namespace: String, name: String },
}

impl fmt::Display for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSource::Secret {
                namespace, name, ..
            } => write!(f, "secret {}/{}", namespace, name),
            ConnectionSource::Instance { namespace, name } => {
                write!(f, "instance {}/{}", namespace, name)
            }
        }
    }
}

// =============================================================================
// Secret Key Reference
// =============================================================================

/// Reference to one key of a secret in the record's namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

// =============================================================================
// Sensitive Values
// =============================================================================

/// A credential or generated key whose `Debug` and `Display` are redacted.
///
/// Serializes as the plain string so it can be placed in request bodies and
/// secret data.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sensitive(String);

impl Sensitive {
    pub fn new(value: impl Into<String>) -> Self {
        Sensitive(value.into())
    }

    /// Returns the secret value. Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sensitive(***)")
    }
}

impl fmt::Display for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
