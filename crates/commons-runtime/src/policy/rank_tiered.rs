//! Rank-tiered policy
//!
//! Contributing at least `rank_threshold` holds or raises an agent's rank;
//! falling short demotes it. Withdrawal entitlement is the agent's share of
//! the pool weighted by rank, and higher ranks withdraw first. After each
//! contribution phase, chairs sampled by rank must agree on a rank table.

use super::{GovernancePolicy, PostContributionContext};
use crate::agent::AgentRoster;
use commons_types::{AgentId, AuditRecord, CommonsError, CommonsResult, PolicyConfig, PolicyKind};
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct RankTieredPolicy {
    record: AuditRecord,
    ranks: BTreeMap<AgentId, u32>,
    threshold: u64,
    min_rank: u32,
    max_rank: u32,
    pool_weight: u64,
    chair_count: usize,
    max_chair_rounds: u32,
}

impl RankTieredPolicy {
    /// Every member starts at the minimum rank
    pub fn new(members: &[AgentId], config: &PolicyConfig) -> Self {
        Self {
            record: AuditRecord::with_cost_per_slot(
                config.audit_duration,
                config.rank_audit_slot_cost,
            ),
            ranks: members
                .iter()
                .map(|id| (id.clone(), config.min_rank))
                .collect(),
            threshold: config.rank_threshold,
            min_rank: config.min_rank,
            max_rank: config.max_rank,
            pool_weight: config.rank_pool_weight,
            chair_count: config.chair_count,
            max_chair_rounds: config.max_chair_rounds,
        }
    }

    /// Current rank; agents the policy has not seen hold the minimum rank
    pub fn rank_of(&self, agent_id: &AgentId) -> u32 {
        self.ranks.get(agent_id).copied().unwrap_or(self.min_rank)
    }

    /// Set a rank, clamped to the configured bounds
    pub fn set_rank(&mut self, agent_id: &AgentId, rank: u32) {
        let rank = rank.clamp(self.min_rank, self.max_rank);
        self.ranks.insert(agent_id.clone(), rank);
    }

    pub fn ranks(&self) -> &BTreeMap<AgentId, u32> {
        &self.ranks
    }

    fn total_rank(&self) -> u64 {
        self.ranks.values().map(|r| u64::from(*r)).sum()
    }

    /// Pick one agent with probability proportional to its rank
    pub fn weighted_random_selection(
        &self,
        candidates: &[AgentId],
        rng: &mut dyn RngCore,
    ) -> CommonsResult<AgentId> {
        if candidates.is_empty() {
            return Err(CommonsError::EmptySelection);
        }

        let total: u64 = candidates.iter().map(|id| u64::from(self.rank_of(id))).sum();
        if total == 0 {
            return Err(CommonsError::EmptySelection);
        }

        let mut pick = rng.gen_range(0..total);
        for id in candidates {
            let weight = u64::from(self.rank_of(id));
            if pick < weight {
                return Ok(id.clone());
            }
            pick -= weight;
        }
        Err(CommonsError::EmptySelection)
    }

    /// Sample up to `n` distinct chairs weighted by rank
    pub fn select_chairs(
        &self,
        candidates: &[AgentId],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> CommonsResult<Vec<AgentId>> {
        let mut remaining = candidates.to_vec();
        let mut chairs = Vec::with_capacity(n.min(remaining.len()));
        let first = self.weighted_random_selection(&remaining, rng)?;
        remaining.retain(|id| id != &first);
        chairs.push(first);

        while chairs.len() < n && !remaining.is_empty() {
            let chair = self.weighted_random_selection(&remaining, rng)?;
            remaining.retain(|id| id != &chair);
            chairs.push(chair);
        }
        Ok(chairs)
    }

    /// Run chair consensus over the members' rank table.
    ///
    /// Returns whether the chairs agreed within the round limit.
    fn chair_consensus(
        &mut self,
        ctx: &PostContributionContext<'_>,
        agents: &mut AgentRoster,
        rng: &mut dyn RngCore,
    ) -> CommonsResult<bool> {
        let chairs = self.select_chairs(ctx.members, self.chair_count, rng)?;

        for round in 1..=self.max_chair_rounds {
            let current: BTreeMap<AgentId, u32> = ctx
                .members
                .iter()
                .map(|id| (id.clone(), self.rank_of(id)))
                .collect();

            let proposals: Vec<BTreeMap<AgentId, u32>> = chairs
                .iter()
                .filter_map(|chair| agents.get_mut(chair).map(|a| a.propose_ranks(&current)))
                .collect();

            let agreed = proposals
                .first()
                .filter(|first| proposals.iter().all(|p| p == *first))
                .cloned();

            if let Some(table) = agreed {
                for (id, rank) in table {
                    if current.contains_key(&id) {
                        self.set_rank(&id, rank);
                    }
                }
                info!(
                    team = %ctx.team_id,
                    round = round,
                    chairs = chairs.len(),
                    "Chairs agreed on rank table"
                );
                return Ok(true);
            }

            for chair in &chairs {
                let demoted = self.rank_of(chair).saturating_sub(1);
                self.set_rank(chair, demoted);
            }
            debug!(team = %ctx.team_id, round = round, "Chairs disagreed, demoted");
        }

        warn!(
            team = %ctx.team_id,
            rounds = self.max_chair_rounds,
            "Chairs failed to reach consensus"
        );
        Ok(false)
    }
}

impl GovernancePolicy for RankTieredPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::RankTiered
    }

    fn audit_record(&self) -> &AuditRecord {
        &self.record
    }

    fn audit_record_mut(&mut self) -> &mut AuditRecord {
        &mut self.record
    }

    fn expected_contribution(&self, _agent_id: &AgentId, agent_score: u64) -> u64 {
        self.threshold.min(agent_score)
    }

    fn set_contribution_audit_result(
        &mut self,
        agent_id: &AgentId,
        _agent_score: u64,
        actual: u64,
        stated: u64,
    ) {
        self.record.add_record(agent_id, stated > actual);

        let mut rank = u64::from(self.rank_of(agent_id));
        if self.threshold > 0 {
            rank = rank.saturating_add(actual / self.threshold);
        }
        rank = rank.min(u64::from(self.max_rank));
        if actual < self.threshold {
            rank = rank.saturating_sub(1);
        }
        self.set_rank(agent_id, u32::try_from(rank).unwrap_or(self.max_rank));
    }

    fn expected_withdrawal(&self, agent_id: &AgentId, _agent_score: u64, common_pool: u64) -> u64 {
        let denominator = self.total_rank() + self.pool_weight;
        if denominator == 0 {
            return 0;
        }
        u64::from(self.rank_of(agent_id)) * (common_pool / denominator)
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
        if actual > stated || actual > entitled {
            self.record.increment_last_record(agent_id);
        }
    }

    /// Charged per slot of the audit window
    fn audit_cost(&self, _common_pool: u64) -> u64 {
        self.record.cost()
    }

    fn withdrawal_order(&self, agent_ids: &[AgentId], _rng: &mut dyn RngCore) -> Vec<AgentId> {
        let mut order = agent_ids.to_vec();
        order.sort_by_key(|id| std::cmp::Reverse(self.rank_of(id)));
        order
    }

    fn run_post_contribution(
        &mut self,
        ctx: &PostContributionContext<'_>,
        agents: &mut AgentRoster,
        rng: &mut dyn RngCore,
    ) -> CommonsResult<()> {
        self.ranks.retain(|id, _| ctx.members.contains(id));
        for id in ctx.members {
            self.ranks.entry(id.clone()).or_insert(self.min_rank);
        }
        if ctx.members.is_empty() {
            return Ok(());
        }
        self.chair_consensus(ctx, agents, rng)?;
        Ok(())
    }
}
