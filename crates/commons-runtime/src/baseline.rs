//! Honest reference agent
//!
//! Pays and draws exactly what its team's policy expects, tells the truth,
//! and never calls for audits. It remembers which teammates failed audits
//! and refuses to admit them.

use crate::agent::{CommonsAgent, ContributionContext, Declaration, WithdrawalContext};
use commons_types::{AgentId, TeamId, TeamMessage, Vote};
use std::collections::BTreeMap;

/// Default governance preference, most preferred first
pub const DEFAULT_AOA_RANKING: [usize; 4] = [3, 2, 1, 0];

#[derive(Clone, Debug)]
pub struct BaselineAgent {
    id: AgentId,
    team_id: Option<TeamId>,
    last_team_id: Option<TeamId>,
    score: u64,
    income: u64,
    aoa_ranking: Vec<usize>,
    team_ranking: Vec<TeamId>,
    /// Failed audits observed per agent
    failed_audits: BTreeMap<AgentId, u32>,
}

impl BaselineAgent {
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            team_id: None,
            last_team_id: None,
            score: 0,
            income: 0,
            aoa_ranking: DEFAULT_AOA_RANKING.to_vec(),
            team_ranking: Vec::new(),
            failed_audits: BTreeMap::new(),
        }
    }

    /// Score earned at the start of every turn
    pub fn with_income(mut self, income: u64) -> Self {
        self.income = income;
        self
    }

    pub fn with_score(mut self, score: u64) -> Self {
        self.score = score;
        self
    }

    pub fn with_aoa_ranking(mut self, ranking: Vec<usize>) -> Self {
        self.aoa_ranking = ranking;
        self
    }

    /// Failed audits this agent has heard about for `agent_id`
    pub fn known_failures(&self, agent_id: &AgentId) -> u32 {
        self.failed_audits.get(agent_id).copied().unwrap_or(0)
    }
}

impl CommonsAgent for BaselineAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn team_id(&self) -> Option<&TeamId> {
        self.team_id.as_ref()
    }

    fn set_team_id(&mut self, team_id: Option<TeamId>) {
        if self.team_id.is_some() && self.team_id != team_id {
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

    fn begin_turn(&mut self) {
        self.score = self.score.saturating_add(self.income);
    }

    fn decide_contribution(&mut self, ctx: &ContributionContext<'_>) -> Declaration {
        Declaration::honest(ctx.expected.min(self.score))
    }

    fn decide_withdrawal(&mut self, ctx: &WithdrawalContext<'_>) -> Declaration {
        Declaration::honest(ctx.expected.min(ctx.live_pool))
    }

    fn contribution_audit_vote(&mut self, _teammates: &[AgentId]) -> Vote {
        Vote::abstain(self.id.clone())
    }

    fn withdrawal_audit_vote(&mut self, _teammates: &[AgentId]) -> Vote {
        Vote::abstain(self.id.clone())
    }

    fn vote_on_agent_entry(&mut self, candidate: &AgentId) -> bool {
        self.known_failures(candidate) == 0
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

    fn receive(&mut self, message: &TeamMessage) {
        match message {
            TeamMessage::ContributionAuditResult { target, failed: true }
            | TeamMessage::WithdrawalAuditResult { target, failed: true } => {
                *self.failed_audits.entry(target.clone()).or_insert(0) += 1;
            }
            _ => {}
        }
    }
}
