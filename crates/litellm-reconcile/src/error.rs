//! # Reconcile Error Types
//!
//! Every failure of a reconcile pass is one [`ReconcileError`]. Each variant
//! maps onto exactly one reason code of the `Ready` condition and decides
//! whether the dispatcher retries with backoff or waits for a spec change.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  variant               reason                 retried                   │
//! │  ───────────────────   ────────────────────   ───────────────────────── │
//! │  InvalidSpec           InvalidSpec            no (await spec change)    │
//! │  Connection            ConnectionError        yes                       │
//! │  Gateway               LitellmError           if transient / auth       │
//! │  DependencyMissing     LitellmError           yes                       │
//! │  DuplicateAlias        DuplicateAlias         no                        │
//! │  RemoteEntityMissing   RemoteModelMissing     no                        │
//! │  DeleteFailed          DeleteFailed           yes                       │
//! │  SecretCreateFailed    SecretCreateFailed     yes                       │
//! │  Plane                 ConnectionError        if the plane says so      │
//! │  Timeout               ConnectionError        yes                       │
//! │  Channel               ConnectionError        no (dispatcher stopped)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;
use thiserror::Error;

use litellm_client::GatewayError;
use litellm_core::{ConnectionRefError, Reason, SpecError};
use litellm_plane::PlaneError;

/// Result type alias for reconcile operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// A failed reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    // =========================================================================
    // Local Errors
    // =========================================================================
    /// The spec could not be projected into a gateway request.
    #[error("invalid spec: {0}")]
    InvalidSpec(#[from] SpecError),

    /// Endpoint or master credential could not be resolved.
    #[error("connection unavailable: {0}")]
    Connection(String),

    // =========================================================================
    // Gateway Errors
    // =========================================================================
    /// A gateway call failed.
    #[error("{operation} failed: {source}")]
    Gateway {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },

    /// An entity this record refers to does not exist on the gateway yet.
    #[error("{0}")]
    DependencyMissing(String),

    /// The natural key belongs to an entity this record does not own.
    #[error("{natural_key} is already used by {remote_id}, which this record does not own")]
    DuplicateAlias {
        natural_key: String,
        remote_id: String,
    },

    /// The recorded remote entity no longer exists.
    #[error("remote entity {remote_id} no longer exists; refusing to recreate it")]
    RemoteEntityMissing { remote_id: String },

    /// The remote delete failed; the finalizer is kept.
    #[error("delete of {remote_id} failed: {source}")]
    DeleteFailed {
        remote_id: String,
        #[source]
        source: GatewayError,
    },

    /// Generated key material could not be stored.
    #[error("secret {secret} could not be stored: {reason}")]
    SecretCreateFailed { secret: String, reason: String },

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// A control-plane read or write failed.
    #[error(transparent)]
    Plane(#[from] PlaneError),

    /// The pass did not finish within its deadline.
    #[error("reconcile pass timed out after {0:?}")]
    Timeout(Duration),

    /// A dispatcher channel was closed.
    #[error("channel error: {0}")]
    Channel(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ConnectionRefError> for ReconcileError {
    fn from(err: ConnectionRefError) -> Self {
        ReconcileError::Connection(err.to_string())
    }
}

impl ReconcileError {
    /// Wraps a gateway error with the operation that produced it.
    pub fn gateway(operation: &'static str) -> impl FnOnce(GatewayError) -> Self {
        move |source| ReconcileError::Gateway { operation, source }
    }

    // =========================================================================
    // Categorization
    // =========================================================================

    /// The reason code surfaced on the `Ready` condition.
    pub fn reason(&self) -> Reason {
        match self {
            ReconcileError::InvalidSpec(_) => Reason::InvalidSpec,
            ReconcileError::Connection(_)
            | ReconcileError::Plane(_)
            | ReconcileError::Timeout(_)
            | ReconcileError::Channel(_) => Reason::ConnectionError,
            ReconcileError::Gateway { .. } | ReconcileError::DependencyMissing(_) => {
                Reason::LitellmError
            }
            ReconcileError::DuplicateAlias { .. } => Reason::DuplicateAlias,
            ReconcileError::RemoteEntityMissing { .. } => Reason::RemoteModelMissing,
            ReconcileError::DeleteFailed { .. } => Reason::DeleteFailed,
            ReconcileError::SecretCreateFailed { .. } => Reason::SecretCreateFailed,
        }
    }

    /// Returns true if the same pass may succeed later without a spec change.
    ///
    /// ## Non-Retryable Errors
    /// - Invalid specs
    /// - Gateway 4xx rejections other than authentication failures
    /// - Alias conflicts and missing recorded entities
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::InvalidSpec(_)
            | ReconcileError::DuplicateAlias { .. }
            | ReconcileError::RemoteEntityMissing { .. }
            | ReconcileError::Channel(_) => false,
            ReconcileError::Gateway { source, .. } => {
                source.is_retryable() || source.is_auth_failure()
            }
            ReconcileError::Plane(err) => err.is_retryable(),
            ReconcileError::Connection(_)
            | ReconcileError::DependencyMissing(_)
            | ReconcileError::DeleteFailed { .. }
            | ReconcileError::SecretCreateFailed { .. }
            | ReconcileError::Timeout(_) => true,
        }
    }

    /// Returns true if the gateway rejected the master credential.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ReconcileError::Gateway { source, .. } | ReconcileError::DeleteFailed { source, .. } => {
                source.is_auth_failure()
            }
            _ => false,
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Operator configuration could not be loaded or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override has an unusable value.
    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: String, value: String },

    /// A setting is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience type alias for Results with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================
