//! Per-turn snapshots handed to the data recorder

use crate::{AgentId, PolicyKind, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent's state at the end of a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTurnRecord {
    pub agent_id: AgentId,
    pub score: u64,
    pub contribution: u64,
    pub stated_contribution: u64,
    pub withdrawal: u64,
    pub stated_withdrawal: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub alive: bool,
}

impl AgentTurnRecord {
    /// Record with no activity this turn
    pub fn idle(agent_id: AgentId, score: u64, team_id: Option<TeamId>, alive: bool) -> Self {
        Self {
            agent_id,
            score,
            contribution: 0,
            stated_contribution: 0,
            withdrawal: 0,
            stated_withdrawal: 0,
            team_id,
            alive,
        }
    }
}

/// One team's state at the end of a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamTurnRecord {
    pub team_id: TeamId,
    pub common_pool: u64,
    pub policy: PolicyKind,
    pub members: Vec<AgentId>,
}

/// Snapshot of the whole simulation after one turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnRecord {
    pub iteration: u32,
    pub turn: u32,
    pub recorded_at: DateTime<Utc>,
    pub agents: Vec<AgentTurnRecord>,
    pub teams: Vec<TeamTurnRecord>,
}

impl TurnRecord {
    /// Create a record stamped with the current time
    pub fn new(
        iteration: u32,
        turn: u32,
        agents: Vec<AgentTurnRecord>,
        teams: Vec<TeamTurnRecord>,
    ) -> Self {
        Self {
            iteration,
            turn,
            recorded_at: Utc::now(),
            agents,
            teams,
        }
    }

    /// Number of live agents in the snapshot
    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    /// Record for one agent
    pub fn agent(&self, agent_id: &AgentId) -> Option<&AgentTurnRecord> {
        self.agents.iter().find(|a| &a.agent_id == agent_id)
    }
}
