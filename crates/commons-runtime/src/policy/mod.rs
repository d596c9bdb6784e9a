//! Governance policies (a team's Articles of Association)
//!
//! Every variant implements [`GovernancePolicy`]. A policy instance belongs
//! to exactly one team and is replaced wholesale when the team votes in a
//! new one; no state migrates between instances.

mod fixed;
mod leader_weighted;
mod need_based;
mod rank_tiered;
pub mod vote_rules;

pub use fixed::FixedPolicy;
pub use leader_weighted::LeaderWeightedPolicy;
pub use need_based::{resource_allocation, NeedBasedPolicy};
pub use rank_tiered::RankTieredPolicy;

use crate::agent::AgentRoster;
use commons_types::{AgentId, AuditRecord, CommonsResult, PolicyConfig, PolicyKind, TeamId, Vote};
use rand::{seq::SliceRandom, RngCore};
use std::collections::BTreeMap;

/// Team state handed to a policy once contributions are settled
#[derive(Clone, Copy, Debug)]
pub struct PostContributionContext<'a> {
    pub team_id: &'a TeamId,
    /// Live members taking part in this turn
    pub members: &'a [AgentId],
    /// Pool after this turn's contributions and contribution audit
    pub common_pool: u64,
}

/// Contribution, withdrawal, and audit rules of one team
pub trait GovernancePolicy: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> PolicyKind;

    fn audit_record(&self) -> &AuditRecord;

    fn audit_record_mut(&mut self) -> &mut AuditRecord;

    /// Amount the policy expects the agent to contribute this turn
    fn expected_contribution(&self, agent_id: &AgentId, agent_score: u64) -> u64;

    fn set_contribution_audit_result(
        &mut self,
        agent_id: &AgentId,
        agent_score: u64,
        actual: u64,
        stated: u64,
    );

    /// Withdrawal entitlement given the live pool
    fn expected_withdrawal(&self, agent_id: &AgentId, agent_score: u64, common_pool: u64) -> u64;

    /// Record a withdrawal; `common_pool` is the pool before any withdrawal this turn
    fn set_withdrawal_audit_result(
        &mut self,
        agent_id: &AgentId,
        agent_score: u64,
        actual: u64,
        stated: u64,
        common_pool: u64,
    );

    fn audit_cost(&self, common_pool: u64) -> u64;

    /// Resolve ballots into at most one audit target
    fn vote_result(&self, votes: &[Vote]) -> Option<AgentId> {
        vote_rules::strict_majority(votes)
    }

    /// Whether the agent failed its contribution audit; clears its window
    fn contribution_audit_result(&mut self, agent_id: &AgentId) -> bool {
        read_and_clear(self.audit_record_mut(), agent_id)
    }

    /// Whether the agent failed its withdrawal audit; clears its window
    fn withdrawal_audit_result(&mut self, agent_id: &AgentId) -> bool {
        read_and_clear(self.audit_record_mut(), agent_id)
    }

    /// Order in which members draw from the pool
    fn withdrawal_order(&self, agent_ids: &[AgentId], rng: &mut dyn RngCore) -> Vec<AgentId> {
        let mut order = agent_ids.to_vec();
        order.shuffle(rng);
        order
    }

    /// Apply the audit window length proposed on the ballots, if any
    fn negotiate_audit_duration(&mut self, votes: &[Vote]) {
        if let Some(duration) = vote_rules::proposed_audit_duration(votes) {
            self.audit_record_mut().set_audit_duration(duration);
        }
    }

    /// Hook run after the contribution audit and before withdrawals
    fn run_post_contribution(
        &mut self,
        _ctx: &PostContributionContext<'_>,
        _agents: &mut AgentRoster,
        _rng: &mut dyn RngCore,
    ) -> CommonsResult<()> {
        Ok(())
    }

    /// Per-agent allocation of `remaining` resources; empty when the
    /// policy does not allocate
    fn resource_allocation(
        &mut self,
        _agent_scores: &BTreeMap<AgentId, u64>,
        _remaining: u64,
    ) -> BTreeMap<AgentId, u64> {
        BTreeMap::new()
    }
}

fn read_and_clear(record: &mut AuditRecord, agent_id: &AgentId) -> bool {
    let failed = record.get_all_infractions(agent_id) > 0;
    record.clear_all_infractions(agent_id);
    failed
}

/// Construct a fresh policy of the given kind for a team's members
pub fn build_policy(
    kind: PolicyKind,
    members: &[AgentId],
    config: &PolicyConfig,
) -> Box<dyn GovernancePolicy> {
    match kind {
        PolicyKind::Fixed => Box::new(FixedPolicy::new(config)),
        PolicyKind::RankTiered => Box::new(RankTieredPolicy::new(members, config)),
        PolicyKind::LeaderWeighted => Box::new(LeaderWeightedPolicy::new(members, config)),
        PolicyKind::NeedBased => Box::new(NeedBasedPolicy::new(config)),
    }
}

/// `value * percent / 100` without intermediate overflow
pub(crate) fn percent_of(value: u64, percent: u64) -> u64 {
    ((value as u128 * percent as u128) / 100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n)).collect()
    }

    #[test]
    fn test_build_policy_kinds() {
        let members = ids(&["a", "b"]);
        let config = PolicyConfig::default();
        for kind in PolicyKind::ALL {
            assert_eq!(build_policy(kind, &members, &config).kind(), kind);
        }
    }

    #[test]
    fn test_audit_result_clears_on_read() {
        let members = ids(&["a", "b"]);
        let config = PolicyConfig::default();
        for kind in PolicyKind::ALL {
            let mut policy = build_policy(kind, &members, &config);
            policy.set_contribution_audit_result(&members[0], 10, 1, 9);
            assert!(policy.contribution_audit_result(&members[0]), "{kind}");
            assert!(!policy.contribution_audit_result(&members[0]), "{kind}");
        }
    }

    #[test]
    fn test_default_withdrawal_order_is_permutation() {
        let members = ids(&["a", "b", "c", "d", "e"]);
        let policy = FixedPolicy::new(&PolicyConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let mut order = policy.withdrawal_order(&members, &mut rng);
        order.sort();
        assert_eq!(order, members);
    }

    #[test]
    fn test_negotiated_duration_updates_cost() {
        let mut policy = FixedPolicy::new(&PolicyConfig::default());
        let votes = vec![
            Vote::against(AgentId::new("a")).with_audit_duration(2),
            Vote::against(AgentId::new("b")).with_audit_duration(8),
            Vote::against(AgentId::new("c")).with_audit_duration(4),
        ];
        policy.negotiate_audit_duration(&votes);
        assert_eq!(policy.audit_record().duration(), 4);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(200, 5), 10);
        assert_eq!(percent_of(19, 10), 1);
        assert_eq!(percent_of(u64::MAX, 100), u64::MAX);
    }
}
