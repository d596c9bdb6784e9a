//! Agent contract consumed by the runtime
//!
//! Agents are black boxes: the runtime asks them for decisions and ballots
//! and never assumes how they reach them. What an agent may observe at
//! decision time is limited to the context structs handed to it.

use commons_types::{AgentId, TeamId, TeamMessage, Vote};
use std::collections::BTreeMap;

/// An actual amount paired with the amount the agent claims
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Declaration {
    pub actual: u64,
    pub stated: u64,
}

impl Declaration {
    pub fn new(actual: u64, stated: u64) -> Self {
        Self { actual, stated }
    }

    /// Declaration whose stated amount matches the actual one
    pub fn honest(amount: u64) -> Self {
        Self::new(amount, amount)
    }
}

/// What an agent may see when deciding its contribution.
///
/// `visible_pool` is the pool left over from the previous turn; this turn's
/// incoming contributions are never included.
#[derive(Clone, Copy, Debug)]
pub struct ContributionContext<'a> {
    pub team_id: &'a TeamId,
    pub expected: u64,
    pub visible_pool: u64,
}

/// What an agent may see when deciding its withdrawal.
///
/// `live_pool` reflects every withdrawal already made this turn.
#[derive(Clone, Copy, Debug)]
pub struct WithdrawalContext<'a> {
    pub team_id: &'a TeamId,
    pub expected: u64,
    pub live_pool: u64,
}

/// Decision interface every simulated agent implements
pub trait CommonsAgent: Send + Sync {
    fn id(&self) -> &AgentId;

    fn team_id(&self) -> Option<&TeamId>;

    /// Move the agent to a team (or out of one)
    fn set_team_id(&mut self, team_id: Option<TeamId>);

    /// Team the agent belonged to before its current one
    fn last_team_id(&self) -> Option<&TeamId>;

    fn true_score(&self) -> u64;

    fn set_true_score(&mut self, score: u64);

    /// Called once per turn before any phase runs
    fn begin_turn(&mut self) {}

    fn decide_contribution(&mut self, ctx: &ContributionContext<'_>) -> Declaration;

    fn decide_withdrawal(&mut self, ctx: &WithdrawalContext<'_>) -> Declaration;

    /// Ballot on which teammate to audit after contributions
    fn contribution_audit_vote(&mut self, teammates: &[AgentId]) -> Vote;

    /// Ballot on which teammate to audit after withdrawals
    fn withdrawal_audit_vote(&mut self, teammates: &[AgentId]) -> Vote;

    /// Whether the agent accepts `candidate` into its team
    fn vote_on_agent_entry(&mut self, candidate: &AgentId) -> bool;

    /// Governance options, most preferred first
    fn aoa_ranking(&self) -> Vec<usize>;

    /// Teams the agent wants to join, most preferred first
    fn team_ranking(&self) -> Vec<TeamId>;

    fn set_team_ranking(&mut self, ranking: Vec<TeamId>);

    /// Proposed rank table when serving as a chair
    fn propose_ranks(&mut self, current: &BTreeMap<AgentId, u32>) -> BTreeMap<AgentId, u32> {
        current.clone()
    }

    /// Deliver a teammate broadcast
    fn receive(&mut self, _message: &TeamMessage) {}
}

/// Arena of agents keyed by id
#[derive(Default)]
pub struct AgentRoster {
    agents: BTreeMap<AgentId, Box<dyn CommonsAgent>>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an agent, replacing any agent with the same id
    pub fn insert(&mut self, agent: Box<dyn CommonsAgent>) -> AgentId {
        let id = agent.id().clone();
        self.agents.insert(id.clone(), agent);
        id
    }

    pub fn remove(&mut self, agent_id: &AgentId) -> Option<Box<dyn CommonsAgent>> {
        self.agents.remove(agent_id)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&dyn CommonsAgent> {
        self.agents
            .get(agent_id)
            .map(|a| a.as_ref() as &dyn CommonsAgent)
    }

    pub fn get_mut(&mut self, agent_id: &AgentId) -> Option<&mut (dyn CommonsAgent + 'static)> {
        self.agents.get_mut(agent_id).map(|a| a.as_mut())
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// All agent ids in id order
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn CommonsAgent> {
        self.agents.values().map(|a| a.as_ref() as &dyn CommonsAgent)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn CommonsAgent>> {
        self.agents.values_mut()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRoster")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}
