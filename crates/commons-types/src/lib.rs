//! Commons Domain Types
//!
//! This crate defines the domain types for the Commons simulation: agents
//! organised into teams that pay into and draw from a shared common pool
//! under a team-specific governance policy (the team's Articles of
//! Association).
//!
//! # Key Concepts
//!
//! - **Common pool**: the team-shared balance members contribute to and
//!   withdraw from every turn.
//! - **Audit record**: a windowed per-agent history of infraction flags,
//!   used to decide whether an audited agent cheated.
//! - **Vote**: a ballot used both for choosing an audit target and for
//!   negotiating the audit window length.
//! - **Policy kind**: the closed set of governance variants a team can vote
//!   itself into.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime behaviour. All types
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`. IDs use the
//! newtype pattern and implement `Display`, `generate()`, and `new()`.

#![deny(unsafe_code)]

mod audit;
mod config;
mod errors;
mod ids;
mod messages;
mod policy_kind;
mod records;
mod vote;

pub use audit::*;
pub use config::*;
pub use errors::*;
pub use ids::*;
pub use messages::*;
pub use policy_kind::*;
pub use records::*;
pub use vote::*;
