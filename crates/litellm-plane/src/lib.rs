//! # litellm-plane: Control-Plane Record Store
//!
//! Abstraction over the store where desired records live, plus an in-memory
//! implementation.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          litellm-plane                                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    ControlPlane (trait)                          │   │
//! │  │    get · set_finalizers · write_status · get/create_secret      │   │
//! │  └───────────────┬─────────────────────────────────┬───────────────┘   │
//! │                  │                                 │                    │
//! │  ┌───────────────▼──────────────┐  ┌───────────────▼──────────────┐   │
//! │  │ MemoryControlPlane (memory)  │  │ KubePlane (apps/operator)    │   │
//! │  │ tests, local experiments     │  │ dynamic API + Secrets        │   │
//! │  └──────────────────────────────┘  └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`plane`] - The `ControlPlane` trait
//! - [`record`] - Untyped records and typed decoding
//! - [`secret`] - Secrets and owner references
//! - [`memory`] - In-memory implementation
//! - [`error`] - Error types

pub mod error;
pub mod memory;
pub mod plane;
pub mod record;
pub mod secret;

pub use error::{PlaneError, PlaneResult};
pub use memory::{MemoryControlPlane, PlaneEvent};
pub use plane::ControlPlane;
pub use record::RawRecord;
pub use secret::{NewSecret, OwnerRef, Secret};
