//! Ballot tallying shared by the policy variants

use commons_types::{AgentId, Vote};
use std::collections::BTreeMap;

/// Candidate holding a strict majority of the non-abstaining ballots
pub fn strict_majority(votes: &[Vote]) -> Option<AgentId> {
    weighted_majority(votes, |vote| vote.weight())
}

/// Candidate whose weighted favorable tally exceeds half of the weighted
/// non-abstaining total. Ties and insufficient support resolve to `None`.
pub fn weighted_majority<F>(votes: &[Vote], weight_of: F) -> Option<AgentId>
where
    F: Fn(&Vote) -> u32,
{
    let mut total: u64 = 0;
    let mut tallies: BTreeMap<&AgentId, u64> = BTreeMap::new();

    for vote in votes.iter().filter(|v| !v.is_abstain()) {
        let weight = u64::from(weight_of(vote));
        total += weight;
        if let Some(candidate) = vote.supported_candidate() {
            *tallies.entry(candidate).or_insert(0) += weight;
        }
    }

    let (leader, best) = tallies.iter().max_by_key(|(_, tally)| **tally)?;
    if 2 * *best > total {
        Some((*leader).clone())
    } else {
        None
    }
}

/// Median of the audit window lengths proposed by non-abstaining voters
pub fn proposed_audit_duration(votes: &[Vote]) -> Option<usize> {
    let mut proposals: Vec<usize> = votes
        .iter()
        .filter(|v| !v.is_abstain())
        .filter_map(|v| v.audit_duration)
        .filter(|d| *d > 0)
        .collect();
    if proposals.is_empty() {
        return None;
    }
    proposals.sort_unstable();
    Some(proposals[(proposals.len() - 1) / 2])
}
