//! Error types for the Commons layer

use crate::{AgentId, TeamId};

/// Errors that can occur in Commons operations
#[derive(Debug, thiserror::Error)]
pub enum CommonsError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Agent {agent} already belongs to team {team}")]
    AgentAlreadyInTeam { agent: AgentId, team: TeamId },

    #[error("Agent {agent} is not a member of team {team}")]
    NotATeamMember { agent: AgentId, team: TeamId },

    #[error("Invalid team: {reason}")]
    InvalidTeam { reason: String },

    #[error("Weighted selection invoked on an empty candidate set")]
    EmptySelection,

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CommonsError {
    /// Whether the error marks a programming-contract violation rather than
    /// a missing entity that can be skipped
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommonsError::EmptySelection)
    }
}

/// Result type for Commons operations
pub type CommonsResult<T> = Result<T, CommonsError>;
