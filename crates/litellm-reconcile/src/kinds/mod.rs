//! # Per-Kind Adapters
//!
//! ```text
//! kind                    adapter             natural key          remote id
//! ─────────────────────   ─────────────────   ──────────────────   ─────────────────
//! User                    AccountAdapter      userEmail            user_id
//! Team                    TeamAdapter         teamAlias            team_id
//! VirtualKey              ApiKeyAdapter       keyAlias             token hash
//! TeamMemberAssociation   MembershipAdapter   teamAlias/userEmail  team_id:user_id
//! Model                   ModelAdapter        record uid           model_info.id
//! ```

pub mod account;
pub mod api_key;
pub mod membership;
pub mod model;
pub mod team;

pub use account::AccountAdapter;
pub use api_key::ApiKeyAdapter;
pub use membership::MembershipAdapter;
pub use model::ModelAdapter;
pub use team::TeamAdapter;
