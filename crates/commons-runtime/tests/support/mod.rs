//! Scripted agents for integration tests

#![allow(dead_code)]

use commons_runtime::{
    build_policy, AgentRoster, CommonsAgent, ContributionContext, Declaration, Team,
    TeamRegistry, WithdrawalContext,
};
use commons_types::{AgentId, PolicyConfig, PolicyKind, TeamId, TeamMessage, Vote};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What an agent saw when it was asked to decide
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub agent: AgentId,
    pub phase: Phase,
    pub score: u64,
    pub pool: u64,
    pub expected: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Contribution,
    Withdrawal,
}

pub type Observer = Arc<Mutex<Vec<Observation>>>;

pub fn observer() -> Observer {
    Arc::new(Mutex::new(Vec::new()))
}

/// A rank table a scripted agent was shown while serving as chair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChairCall {
    pub chair: AgentId,
    /// Contributions the chair had made when it was asked, so 1 on the first turn
    pub turn: usize,
    pub ranks: BTreeMap<AgentId, u32>,
}

pub type ChairLog = Arc<Mutex<Vec<ChairCall>>>;

pub fn chair_log() -> ChairLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// What a scripted agent proposes when serving as chair
#[derive(Clone, Debug, Default)]
pub enum Proposal {
    /// Keep the table as shown
    #[default]
    Keep,
    /// Raise the given agent far above any rank ceiling
    Promote(AgentId),
}

/// How a scripted agent answers a decision
#[derive(Clone, Copy, Debug)]
pub enum Script {
    /// Do and state exactly what the policy expects
    Expected,
    /// Do and state a fixed amount
    Fixed(u64),
    /// Do `actual` but claim `stated`
    Lie { actual: u64, stated: u64 },
}

impl Script {
    fn declare(self, expected: u64) -> Declaration {
        match self {
            Script::Expected => Declaration::honest(expected),
            Script::Fixed(amount) => Declaration::honest(amount),
            Script::Lie { actual, stated } => Declaration::new(actual, stated),
        }
    }
}

pub struct ScriptedAgent {
    id: AgentId,
    team_id: Option<TeamId>,
    last_team_id: Option<TeamId>,
    score: u64,
    contribution: Script,
    withdrawal: Script,
    audit_target: Option<AgentId>,
    accepts_entry: bool,
    aoa_ranking: Vec<usize>,
    team_ranking: Vec<TeamId>,
    observer: Option<Observer>,
    proposal: Proposal,
    chair_log: Option<ChairLog>,
    contributions_made: usize,
    inbox: Arc<Mutex<Vec<TeamMessage>>>,
}

impl ScriptedAgent {
    pub fn new(id: &str) -> Self {
        Self {
            id: AgentId::new(id),
            team_id: None,
            last_team_id: None,
            score: 0,
            contribution: Script::Expected,
            withdrawal: Script::Expected,
            audit_target: None,
            accepts_entry: true,
            aoa_ranking: vec![0, 1, 2, 3],
            team_ranking: Vec::new(),
            observer: None,
            proposal: Proposal::Keep,
            chair_log: None,
            contributions_made: 0,
            inbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_score(mut self, score: u64) -> Self {
        self.score = score;
        self
    }

    pub fn with_contribution(mut self, script: Script) -> Self {
        self.contribution = script;
        self
    }

    pub fn with_withdrawal(mut self, script: Script) -> Self {
        self.withdrawal = script;
        self
    }

    /// Vote to audit `target` in both audit rounds
    pub fn auditing(mut self, target: &str) -> Self {
        self.audit_target = Some(AgentId::new(target));
        self
    }

    pub fn rejecting_entrants(mut self) -> Self {
        self.accepts_entry = false;
        self
    }

    pub fn with_aoa_ranking(mut self, ranking: Vec<usize>) -> Self {
        self.aoa_ranking = ranking;
        self
    }

    pub fn with_team_ranking(mut self, ranking: Vec<TeamId>) -> Self {
        self.team_ranking = ranking;
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn proposing(mut self, proposal: Proposal) -> Self {
        self.proposal = proposal;
        self
    }

    pub fn with_chair_log(mut self, log: ChairLog) -> Self {
        self.chair_log = Some(log);
        self
    }

    pub fn in_team(mut self, team_id: &TeamId) -> Self {
        self.team_id = Some(team_id.clone());
        self
    }

    /// Shared view of every broadcast this agent receives
    pub fn inbox(&self) -> Arc<Mutex<Vec<TeamMessage>>> {
        self.inbox.clone()
    }

    fn observe(&self, phase: Phase, pool: u64, expected: u64) {
        if let Some(observer) = &self.observer {
            observer.lock().push(Observation {
                agent: self.id.clone(),
                phase,
                score: self.score,
                pool,
                expected,
            });
        }
    }

    fn audit_vote(&self) -> Vote {
        match &self.audit_target {
            Some(target) => Vote::favor(self.id.clone(), target.clone()),
            None => Vote::abstain(self.id.clone()),
        }
    }
}

impl CommonsAgent for ScriptedAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn team_id(&self) -> Option<&TeamId> {
        self.team_id.as_ref()
    }

    fn set_team_id(&mut self, team_id: Option<TeamId>) {
        if self.team_id.is_some() {
            self.last_team_id = self.team_id.take();
        }
        self.team_id = team_id;
    }

    fn last_team_id(&self) -> Option<&TeamId> {
        self.last_team_id.as_ref()
    }

    fn true_score(&self) -> u64 {
        self.score
    }

    fn set_true_score(&mut self, score: u64) {
        self.score = score;
    }

    fn decide_contribution(&mut self, ctx: &ContributionContext<'_>) -> Declaration {
        self.contributions_made += 1;
        self.observe(Phase::Contribution, ctx.visible_pool, ctx.expected);
        self.contribution.declare(ctx.expected)
    }

    fn decide_withdrawal(&mut self, ctx: &WithdrawalContext<'_>) -> Declaration {
        self.observe(Phase::Withdrawal, ctx.live_pool, ctx.expected);
        self.withdrawal.declare(ctx.expected)
    }

    fn contribution_audit_vote(&mut self, _teammates: &[AgentId]) -> Vote {
        self.audit_vote()
    }

    fn withdrawal_audit_vote(&mut self, _teammates: &[AgentId]) -> Vote {
        self.audit_vote()
    }

    fn vote_on_agent_entry(&mut self, _candidate: &AgentId) -> bool {
        self.accepts_entry
    }

    fn aoa_ranking(&self) -> Vec<usize> {
        self.aoa_ranking.clone()
    }

    fn team_ranking(&self) -> Vec<TeamId> {
        self.team_ranking.clone()
    }

    fn set_team_ranking(&mut self, ranking: Vec<TeamId>) {
        self.team_ranking = ranking;
    }

    fn propose_ranks(&mut self, current: &BTreeMap<AgentId, u32>) -> BTreeMap<AgentId, u32> {
        if let Some(log) = &self.chair_log {
            log.lock().push(ChairCall {
                chair: self.id.clone(),
                turn: self.contributions_made,
                ranks: current.clone(),
            });
        }
        let mut proposal = current.clone();
        if let Proposal::Promote(target) = &self.proposal {
            proposal.insert(target.clone(), u32::MAX);
        }
        proposal
    }

    fn receive(&mut self, message: &TeamMessage) {
        self.inbox.lock().push(message.clone());
    }
}

/// Register a team with the given members and a fresh policy
pub fn add_team(
    registry: &mut TeamRegistry,
    team_id: &TeamId,
    members: &[&str],
    kind: PolicyKind,
    config: &PolicyConfig,
) {
    let members: Vec<AgentId> = members.iter().map(|m| AgentId::new(*m)).collect();
    let policy = build_policy(kind, &members, config);
    registry.insert(Team::new(team_id.clone(), members, policy));
}

pub fn roster(agents: Vec<ScriptedAgent>) -> AgentRoster {
    let mut roster = AgentRoster::new();
    for agent in agents {
        roster.insert(Box::new(agent));
    }
    roster
}

pub fn scores(roster: &AgentRoster) -> BTreeMap<AgentId, u64> {
    roster
        .iter()
        .map(|agent| (agent.id().clone(), agent.true_score()))
        .collect()
}
