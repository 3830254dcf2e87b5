//! # litellm-reconcile: Reconciliation Engine for the LiteLLM Operator
//!
//! Keeps every desired record in line with the entity it describes on the
//! gateway, and reports the result back on the record.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Reconciliation Flow                            │
//! │                                                                         │
//! │  record changed / drift timer / backoff timer                           │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  ┌───────────────┐   one pass per key at a time                         │
//! │  │  Dispatcher   │─────────────────────────────┐                        │
//! │  └───────────────┘                             │                        │
//! │                                                ▼                        │
//! │  ┌───────────────┐   ┌──────────────────┐   ┌──────────────────────┐   │
//! │  │  Controller   │──►│ ConnectionCache  │──►│ GatewayClient        │   │
//! │  │  (per kind)   │   │ + Resolver       │   │ (master key, url)    │   │
//! │  └──────┬────────┘   └──────────────────┘   └──────────────────────┘   │
//! │         │                                                               │
//! │         ├──► EntityAdapter (kinds/)   project · find · diff · write     │
//! │         ├──► finalizer                two-phase deletion                │
//! │         ├──► secrets                  generated key material            │
//! │         └──► projector                Ready / Deleting conditions       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`dispatcher`] - Per-kind worker pool with retry and drift timers
//! - [`engine`] - The generic reconcile pass
//! - [`adapter`] - The per-kind seam the pass is written against
//! - [`kinds`] - Adapters for accounts, teams, keys, memberships and models
//! - [`connection`] - Connection resolution and client cache
//! - [`finalizer`] - Finalizer handling and remote deletion
//! - [`projector`] - Status conditions
//! - [`secrets`] - Generated key secrets
//! - [`drift`] - Periodic revisit scheduling
//! - [`config`] - Operator configuration
//! - [`error`] - Reconcile and configuration errors

pub mod adapter;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod drift;
pub mod engine;
pub mod error;
pub mod finalizer;
pub mod kinds;
pub mod projector;
pub mod secrets;

pub use adapter::EntityAdapter;
pub use config::{LogFormat, OperatorConfig};
pub use connection::{ConnectionCache, ConnectionDetails, ConnectionResolver};
pub use dispatcher::{DispatchConfig, DispatchStats, Dispatcher, DispatcherHandle};
pub use drift::DriftScheduler;
pub use engine::{Controller, PassOutcome, Reconciler};
pub use error::{ConfigError, ConfigResult, ReconcileError, ReconcileResult};
pub use kinds::{AccountAdapter, ApiKeyAdapter, MembershipAdapter, ModelAdapter, TeamAdapter};
