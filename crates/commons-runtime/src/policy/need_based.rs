//! Need-based policy
//!
//! Members pay in a fixed share of their score. After contributions the
//! pool is allocated by need: members below the need threshold are served
//! first, poorest first, and what is left is split evenly. Members with a
//! streak of honest contributions earn a bonus on top.

use super::{percent_of, GovernancePolicy, PostContributionContext};
use crate::agent::AgentRoster;
use commons_types::{AgentId, AuditRecord, CommonsResult, PolicyConfig, PolicyKind};
use rand::RngCore;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct NeedBasedPolicy {
    record: AuditRecord,
    contribution_percent: u64,
    alpha: f64,
    audit_percent: u64,
    streak_for_bonus: u32,
    bonus_percent: u64,
    expulsion_strikes: u32,
    /// Entitlements for the current turn
    allocation: BTreeMap<AgentId, u64>,
    /// Consecutive honest contributions
    honest_streaks: BTreeMap<AgentId, u32>,
    failed_audits: BTreeMap<AgentId, u32>,
}

impl NeedBasedPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            record: AuditRecord::new(config.audit_duration),
            contribution_percent: config.need_contribution_percent,
            alpha: config.need_alpha,
            audit_percent: config.need_audit_percent,
            streak_for_bonus: config.honest_streak_for_bonus,
            bonus_percent: config.bonus_percent,
            expulsion_strikes: config.expulsion_strikes,
            allocation: BTreeMap::new(),
            honest_streaks: BTreeMap::new(),
            failed_audits: BTreeMap::new(),
        }
    }

    pub fn allocation(&self) -> &BTreeMap<AgentId, u64> {
        &self.allocation
    }

    pub fn honest_streak(&self, agent_id: &AgentId) -> u32 {
        self.honest_streaks.get(agent_id).copied().unwrap_or(0)
    }

    /// Bonus owed to the agent out of `common_pool`
    pub fn bonus(&self, agent_id: &AgentId, common_pool: u64) -> u64 {
        if self.streak_for_bonus > 0 && self.honest_streak(agent_id) >= self.streak_for_bonus {
            percent_of(common_pool, self.bonus_percent)
        } else {
            0
        }
    }

    /// Whether the agent has failed enough audits to be expelled.
    ///
    /// Reported only; removing members is left to team formation.
    pub fn should_expel(&self, agent_id: &AgentId) -> bool {
        self.failed_audits.get(agent_id).copied().unwrap_or(0) >= self.expulsion_strikes
    }

    fn note_audit(&mut self, agent_id: &AgentId, failed: bool) -> bool {
        if failed {
            let strikes = self.failed_audits.entry(agent_id.clone()).or_insert(0);
            *strikes += 1;
            if *strikes >= self.expulsion_strikes {
                warn!(agent = %agent_id, strikes = *strikes, "Member eligible for expulsion");
            }
        }
        failed
    }
}

impl GovernancePolicy for NeedBasedPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::NeedBased
    }

    fn audit_record(&self) -> &AuditRecord {
        &self.record
    }

    fn audit_record_mut(&mut self) -> &mut AuditRecord {
        &mut self.record
    }

    fn expected_contribution(&self, _agent_id: &AgentId, agent_score: u64) -> u64 {
        percent_of(agent_score, self.contribution_percent)
    }

    fn set_contribution_audit_result(
        &mut self,
        agent_id: &AgentId,
        _agent_score: u64,
        actual: u64,
        stated: u64,
    ) {
        self.record.add_record(agent_id, stated > actual);

        let streak = self.honest_streaks.entry(agent_id.clone()).or_insert(0);
        if stated == actual {
            *streak += 1;
        } else {
            *streak = 0;
        }
    }

    fn expected_withdrawal(&self, agent_id: &AgentId, _agent_score: u64, _common_pool: u64) -> u64 {
        self.allocation.get(agent_id).copied().unwrap_or(0)
    }

    fn set_withdrawal_audit_result(
        &mut self,
        agent_id: &AgentId,
        _agent_score: u64,
        actual: u64,
        stated: u64,
        _common_pool: u64,
    ) {
        if actual != stated || actual > self.expected_withdrawal(agent_id, 0, 0) {
            self.record.increment_last_record(agent_id);
        }
    }

    /// Five percent of the pool, never less than one
    fn audit_cost(&self, common_pool: u64) -> u64 {
        percent_of(common_pool, self.audit_percent).max(1)
    }

    fn contribution_audit_result(&mut self, agent_id: &AgentId) -> bool {
        let failed = self.record.get_all_infractions(agent_id) > 0;
        self.record.clear_all_infractions(agent_id);
        self.note_audit(agent_id, failed)
    }

    fn withdrawal_audit_result(&mut self, agent_id: &AgentId) -> bool {
        let failed = self.record.get_all_infractions(agent_id) > 0;
        self.record.clear_all_infractions(agent_id);
        self.note_audit(agent_id, failed)
    }

    fn run_post_contribution(
        &mut self,
        ctx: &PostContributionContext<'_>,
        agents: &mut AgentRoster,
        _rng: &mut dyn RngCore,
    ) -> CommonsResult<()> {
        let scores: BTreeMap<AgentId, u64> = ctx
            .members
            .iter()
            .filter_map(|id| agents.get(id).map(|a| (id.clone(), a.true_score())))
            .collect();

        let mut allocation = self.resource_allocation(&scores, ctx.common_pool);
        for (id, amount) in allocation.iter_mut() {
            *amount = amount.saturating_add(self.bonus(id, ctx.common_pool));
        }
        debug!(team = %ctx.team_id, allocation = ?allocation, "Need-based allocation");
        self.allocation = allocation;
        Ok(())
    }

    fn resource_allocation(
        &mut self,
        agent_scores: &BTreeMap<AgentId, u64>,
        remaining: u64,
    ) -> BTreeMap<AgentId, u64> {
        let allocation = resource_allocation(agent_scores, remaining, self.alpha);
        self.allocation = allocation.clone();
        allocation
    }
}

/// Need threshold: `max(median, floor(mean * alpha))` over integer scores.
///
/// Sums are taken in `u128` so scores anywhere in `u64` are accepted.
fn need_threshold(scores: &[u64], alpha: f64) -> u64 {
    if scores.is_empty() {
        return 0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let median = if n % 2 == 0 {
        ((sorted[n / 2 - 1] as u128 + sorted[n / 2] as u128) / 2) as u64
    } else {
        sorted[n / 2]
    };
    let total: u128 = sorted.iter().map(|s| *s as u128).sum();
    let mean = (total / n as u128) as u64;
    median.max((mean as f64 * alpha) as u64)
}

/// Allocate `remaining` by need.
///
/// Agents are visited poorest first (ties by id). Each agent below the need
/// threshold receives `min(need, remaining / (served + 1))`. Whatever is
/// left is then split evenly across every agent.
pub fn resource_allocation(
    agent_scores: &BTreeMap<AgentId, u64>,
    mut remaining: u64,
    alpha: f64,
) -> BTreeMap<AgentId, u64> {
    let mut allocation: BTreeMap<AgentId, u64> =
        agent_scores.keys().map(|id| (id.clone(), 0)).collect();
    if agent_scores.is_empty() {
        return allocation;
    }

    let scores: Vec<u64> = agent_scores.values().copied().collect();
    let threshold = need_threshold(&scores, alpha);

    let mut by_need: Vec<(&AgentId, u64)> = agent_scores.iter().map(|(id, s)| (id, *s)).collect();
    by_need.sort_by_key(|(_, score)| *score);

    let mut served: u64 = 0;
    for (id, score) in by_need {
        if remaining == 0 {
            break;
        }
        let need = threshold.saturating_sub(score);
        if need > 0 {
            let grant = need.min(remaining / (served + 1));
            allocation.insert(id.clone(), grant);
            remaining -= grant;
            served += 1;
        }
    }

    let residual = remaining / agent_scores.len() as u64;
    if residual > 0 {
        for amount in allocation.values_mut() {
            *amount = amount.saturating_add(residual);
        }
    }
    allocation
}
