//! Commons Runtime
//!
//! This crate provides the runtime for the Commons simulation: teams of
//! agents that pay into and draw from a shared common pool, audit each
//! other, and vote on the rules they live under.
//!
//! # Architecture
//!
//! The [`Environment`] is the main entry point. It composes specialised
//! components, each handling one aspect of the simulation:
//!
//! - [`GovernancePolicy`] - Contribution, withdrawal, and audit rules of one team
//! - [`GovernanceSelector`] - Copeland vote with Borda and random tie-breaks
//! - [`TurnEngine`] - Per-team contribution → audit → withdrawal → audit phases
//! - [`TeamAdmission`] - Threshold votes that re-home orphaned agents
//! - [`TeamRegistry`] - Team arena guarded for external status reads
//! - [`TurnLog`] - Per-turn snapshots for the data recorder
//!
//! # Key Invariants
//!
//! 1. Agents never see this turn's incoming contributions before deciding theirs
//! 2. Withdrawals are clamped to the live pool, which never goes negative
//! 3. Policy instances are never shared between teams or carried across votes
//! 4. All randomness flows from one injectable RNG
//!
//! # Example
//!
//! ```rust
//! use commons_runtime::{BaselineAgent, Environment};
//! use commons_types::{AgentId, SimulationConfig};
//!
//! let mut env = Environment::new(SimulationConfig::test_config()).unwrap();
//! for i in 0..6 {
//!     env.add_agent(Box::new(BaselineAgent::new(AgentId::new(format!("agent-{i}")))));
//! }
//!
//! env.run().unwrap();
//! assert_eq!(env.turn_log().len(), 4);
//! ```

#![deny(unsafe_code)]

pub mod admission;
pub mod agent;
pub mod baseline;
pub mod environment;
pub mod messaging;
pub mod policy;
pub mod recorder;
pub mod selector;
pub mod team;
pub mod turn_engine;

// Re-export main types for convenience
pub use admission::{OrphanPool, TeamAdmission};
pub use agent::{AgentRoster, CommonsAgent, ContributionContext, Declaration, WithdrawalContext};
pub use baseline::BaselineAgent;
pub use environment::Environment;
pub use policy::{build_policy, GovernancePolicy, PostContributionContext};
pub use recorder::TurnLog;
pub use selector::{GovernanceSelector, SelectionOutcome};
pub use team::{Team, TeamRegistry, TeamStatus, TeamStatusHandle};
pub use turn_engine::{AgentActivity, AuditOutcome, TeamTurnReport, TurnEngine, TurnPhase};
