//! Leader-weighted policy
//!
//! Members pay in their whole score. The leader is entitled to a larger
//! share of the pool than other members and its audit ballot counts
//! double. Leadership passes each turn to the largest contributor.

use super::{percent_of, vote_rules, GovernancePolicy, PostContributionContext};
use crate::agent::AgentRoster;
use commons_types::{AgentId, AuditRecord, CommonsResult, PolicyConfig, PolicyKind, Vote};
use rand::RngCore;
use std::collections::BTreeMap;
use tracing::info;

/// Audit cost below this pool size is the flat minimum
const SMALL_POOL: u64 = 5;
const SMALL_POOL_AUDIT_COST: u64 = 2;

#[derive(Clone, Debug)]
pub struct LeaderWeightedPolicy {
    record: AuditRecord,
    leader: Option<AgentId>,
    leader_share_percent: u64,
    member_share_percent: u64,
    leader_vote_weight: u32,
    /// Actual contributions made this turn
    contributions: BTreeMap<AgentId, u64>,
}

impl LeaderWeightedPolicy {
    /// The first member leads until the first contribution phase settles
    pub fn new(members: &[AgentId], config: &PolicyConfig) -> Self {
        Self {
            record: AuditRecord::new(config.audit_duration),
            leader: members.first().cloned(),
            leader_share_percent: config.leader_share_percent,
            member_share_percent: config.member_share_percent,
            leader_vote_weight: config.leader_vote_weight,
            contributions: BTreeMap::new(),
        }
    }

    pub fn leader(&self) -> Option<&AgentId> {
        self.leader.as_ref()
    }

    pub fn set_leader(&mut self, leader: AgentId) {
        self.leader = Some(leader);
    }

    fn is_leader(&self, agent_id: &AgentId) -> bool {
        self.leader.as_ref() == Some(agent_id)
    }

    fn share_percent(&self, agent_id: &AgentId) -> u64 {
        if self.is_leader(agent_id) {
            self.leader_share_percent
        } else {
            self.member_share_percent
        }
    }
}

impl GovernancePolicy for LeaderWeightedPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::LeaderWeighted
    }

    fn audit_record(&self) -> &AuditRecord {
        &self.record
    }

    fn audit_record_mut(&mut self) -> &mut AuditRecord {
        &mut self.record
    }

    fn expected_contribution(&self, _agent_id: &AgentId, agent_score: u64) -> u64 {
        agent_score
    }

    fn set_contribution_audit_result(
        &mut self,
        agent_id: &AgentId,
        agent_score: u64,
        actual: u64,
        stated: u64,
    ) {
        // Holding anything back counts against the member too
        self.record
            .add_record(agent_id, stated > actual || actual < agent_score);
        *self.contributions.entry(agent_id.clone()).or_insert(0) += actual;
    }

    fn expected_withdrawal(&self, agent_id: &AgentId, _agent_score: u64, common_pool: u64) -> u64 {
        percent_of(common_pool, self.share_percent(agent_id))
    }

    fn set_withdrawal_audit_result(
        &mut self,
        agent_id: &AgentId,
        agent_score: u64,
        actual: u64,
        stated: u64,
        common_pool: u64,
    ) {
        let entitled = self.expected_withdrawal(agent_id, agent_score, common_pool);
        if actual != stated || actual > entitled {
            self.record.increment_last_record(agent_id);
        }
    }

    fn audit_cost(&self, common_pool: u64) -> u64 {
        if common_pool < SMALL_POOL {
            SMALL_POOL_AUDIT_COST
        } else {
            SMALL_POOL + (common_pool - SMALL_POOL) / SMALL_POOL
        }
    }

    fn vote_result(&self, votes: &[Vote]) -> Option<AgentId> {
        vote_rules::weighted_majority(votes, |vote| {
            if self.is_leader(&vote.voter_id) {
                vote.weight().saturating_mul(self.leader_vote_weight)
            } else {
                vote.weight()
            }
        })
    }

    fn run_post_contribution(
        &mut self,
        ctx: &PostContributionContext<'_>,
        _agents: &mut AgentRoster,
        _rng: &mut dyn RngCore,
    ) -> CommonsResult<()> {
        let contributions = std::mem::take(&mut self.contributions);
        // Highest contributor leads; ties go to the earliest member
        let mut next = None;
        let mut best = 0;
        for id in ctx.members {
            let amount = contributions.get(id).copied().unwrap_or(0);
            if next.is_none() || amount > best {
                next = Some(id.clone());
                best = amount;
            }
        }

        if let Some(leader) = next {
            if !self.is_leader(&leader) {
                info!(team = %ctx.team_id, leader = %leader, contributed = best, "Team leader changed");
            }
            self.leader = Some(leader);
        }
        Ok(())
    }
}
