//! # litellm-client: Gateway Management API
//!
//! Typed access to the gateway's REST management surface.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          litellm-client                                 │
//! │                                                                         │
//! │   GatewayClient ── bearer auth, timeout, TLS, error normalization       │
//! │        │                                                                │
//! │        ├── users()    /user/*                                           │
//! │        ├── teams()    /team/*                                           │
//! │        ├── keys()     /key/*                                            │
//! │        ├── members()  /team/member_*                                    │
//! │        └── models()   /model/*                                          │
//! │                                                                         │
//! │   Request and remote-view types come from litellm-core.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use litellm_client::{ClientOptions, GatewayClient};
//! use litellm_core::Sensitive;
//!
//! # async fn demo() -> litellm_client::GatewayResult<()> {
//! let client = GatewayClient::new(
//!     "http://litellm-service.ml.svc.cluster.local:4000",
//!     Sensitive::new("sk-master"),
//!     &ClientOptions::default(),
//! )?;
//! let team = client.teams().find_by_alias("eng").await?;
//! # let _ = team;
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod client;
pub mod error;
pub mod keys;
pub mod members;
pub mod models;
pub mod teams;
pub mod users;

pub use body::update_body;
pub use client::{ClientOptions, GatewayClient, DEFAULT_TIMEOUT};
pub use error::{GatewayError, GatewayResult};
pub use members::MemberWrite;
pub use teams::{TeamInfo, TeamMembershipRow};
