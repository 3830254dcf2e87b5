//! # litellm-core: Pure Record Logic for the LiteLLM Operator
//!
//! This crate holds everything about desired records that can be decided
//! without talking to anything: typed specs, budget parsing, the projection
//! of a spec into a gateway request, field-level diffing and the condition
//! vocabulary.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      LiteLLM Operator Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/operator (Kubernetes wiring)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        litellm-reconcile (controllers, dispatcher, drift)      │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼─────────────┐    ┌───────────────▼──────────────┐   │
//! │  │ litellm-plane (records)    │    │ litellm-client (gateway REST) │   │
//! │  └──────────────┬─────────────┘    └───────────────┬──────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────────────────────────▼───────────────┐   │
//! │  │               ★ litellm-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐ │   │
//! │  │   │  types   │ │  budget  │ │   diff   │ │ kinds/           │ │   │
//! │  │   │  Record  │ │  Budget  │ │ FieldRule│ │ account team     │ │   │
//! │  │   │ ConnRef  │ │          │ │ DiffRpt  │ │ api_key model    │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ │ membership       │ │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ └──────────────────┘ │   │
//! │  │   │condition │ │lifecycle │ │  naming  │                      │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘                      │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CONTROL PLANE • NO NETWORK • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Record envelope, connection references, resource kinds
//! - [`budget`] - Decimal-string budgets
//! - [`diff`] - Field-rule based drift detection
//! - [`condition`] - Status conditions and reason codes
//! - [`lifecycle`] - Lifecycle state and deletion planning
//! - [`naming`] - Generated secret names
//! - [`validation`] - Projection-time checks
//! - [`kinds`] - Per-kind spec, request, remote view and observed status
//! - [`error`] - Spec and connection-reference errors
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same spec + same remote view = same request and diff
//! 2. **No I/O**: gateway and control-plane access live in other crates
//! 3. **Strings for budgets**: parsed exactly once, before any remote call
//! 4. **Explicit Errors**: every rejection is a typed [`SpecError`]
//!
//! ## Example Usage
//!
//! ```rust
//! use litellm_core::kinds::team::{self, TeamSpec};
//!
//! let spec: TeamSpec = serde_json::from_value(serde_json::json!({
//!     "connectionRef": { "secretRef": { "name": "gateway" } },
//!     "teamAlias": "eng",
//!     "maxBudget": "100",
//! }))
//! .unwrap();
//!
//! let request = spec.to_request("record-uid").unwrap();
//! let remote = team::RemoteTeam {
//!     team_id: "team-1".to_string(),
//!     team_alias: Some("eng".to_string()),
//!     max_budget: Some(150.0),
//!     metadata: Some(request.metadata.clone()),
//!     ..Default::default()
//! };
//!
//! let report = team::diff(&remote, &request);
//! assert!(report.needs_update());
//! assert_eq!(report.changed_fields(), vec!["max_budget"]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod budget;
pub mod condition;
pub mod diff;
pub mod error;
pub mod kinds;
pub mod lifecycle;
pub mod naming;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use budget::Budget;
pub use condition::{Condition, ConditionStatus, ConditionUpdate, Reason};
pub use diff::{Diff, DiffReport, FieldChange, FieldRule};
pub use error::{ConnectionRefError, SpecError, SpecResult};
pub use kinds::Ownership;
pub use lifecycle::{DeletionPlan, LifecycleState};
pub use types::*;
