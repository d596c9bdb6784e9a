//! Governance selection: Copeland vote, Borda tie-break, random tie-break
//!
//! Runs once per team at the start of each iteration. The first two stages
//! are deterministic given the ballots; only the final tie-break draws on
//! the injected RNG.

use crate::agent::AgentRoster;
use crate::policy::build_policy;
use crate::team::Team;
use commons_types::{PolicyConfig, PolicyKind};
use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How a governance vote was decided
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub winner: PolicyKind,
    pub winning_option: usize,
    /// Copeland score per option, in half points
    pub copeland_scores: BTreeMap<usize, u32>,
    /// Borda score per Copeland survivor; empty when Copeland was decisive
    pub borda_scores: BTreeMap<usize, u64>,
    /// Whether the random tie-break was needed
    pub random_tie_break: bool,
}

#[derive(Clone, Debug)]
pub struct GovernanceSelector {
    option_count: usize,
}

impl Default for GovernanceSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl GovernanceSelector {
    /// Selector over every policy kind
    pub fn new() -> Self {
        Self::with_option_count(PolicyKind::COUNT)
    }

    pub fn with_option_count(option_count: usize) -> Self {
        Self {
            option_count: option_count.max(1),
        }
    }

    /// Keep in-range options, first occurrence only
    fn clean_ranking(&self, ranking: &[usize]) -> Vec<usize> {
        let mut seen = vec![false; self.option_count];
        ranking
            .iter()
            .copied()
            .filter(|option| {
                if *option >= self.option_count || seen[*option] {
                    return false;
                }
                seen[*option] = true;
                true
            })
            .collect()
    }

    /// Copeland scores in half points.
    ///
    /// `wins[a][b]` counts the ballots ranking `a` above `b`. An option earns
    /// 2 per matchup it wins and 1 per tied matchup that at least one ballot
    /// decided.
    pub fn copeland_scores(&self, rankings: &[Vec<usize>]) -> BTreeMap<usize, u32> {
        let n = self.option_count;
        let mut wins = vec![vec![0u32; n]; n];
        for ranking in rankings {
            let ranking = self.clean_ranking(ranking);
            for (i, a) in ranking.iter().enumerate() {
                for b in &ranking[i + 1..] {
                    wins[*a][*b] += 1;
                }
            }
        }

        let mut scores: BTreeMap<usize, u32> = (0..n).map(|o| (o, 0)).collect();
        for a in 0..n {
            for b in (a + 1)..n {
                let (ab, ba) = (wins[a][b], wins[b][a]);
                if ab == 0 && ba == 0 {
                    continue;
                }
                if ab > ba {
                    *scores.entry(a).or_insert(0) += 2;
                } else if ba > ab {
                    *scores.entry(b).or_insert(0) += 2;
                } else {
                    *scores.entry(a).or_insert(0) += 1;
                    *scores.entry(b).or_insert(0) += 1;
                }
            }
        }
        scores
    }

    /// Borda scores restricted to `candidates`: each ballot gives
    /// `k - position - 1` to its candidates in order, with `k` survivors
    pub fn borda_scores(&self, rankings: &[Vec<usize>], candidates: &[usize]) -> BTreeMap<usize, u64> {
        let k = candidates.len() as u64;
        let mut scores: BTreeMap<usize, u64> = candidates.iter().map(|c| (*c, 0)).collect();
        for ranking in rankings {
            let filtered = self
                .clean_ranking(ranking)
                .into_iter()
                .filter(|option| candidates.contains(option));
            for (position, option) in filtered.enumerate() {
                *scores.entry(option).or_insert(0) += k - position as u64 - 1;
            }
        }
        scores
    }

    /// Run the full protocol over the ballots
    pub fn select(&self, rankings: &[Vec<usize>], rng: &mut dyn RngCore) -> SelectionOutcome {
        let copeland_scores = self.copeland_scores(rankings);
        let mut candidates = top_scoring(&copeland_scores);

        let mut borda_scores = BTreeMap::new();
        if candidates.len() > 1 {
            borda_scores = self.borda_scores(rankings, &candidates);
            candidates = top_scoring(&borda_scores);
        }

        let random_tie_break = candidates.len() > 1;
        let winning_option = candidates.choose(rng).copied().unwrap_or(0);

        SelectionOutcome {
            winner: PolicyKind::from_index(winning_option),
            winning_option,
            copeland_scores,
            borda_scores,
            random_tie_break,
        }
    }

    /// Replace the team's policy with a fresh instance of the winner
    pub fn install(&self, team: &mut Team, outcome: &SelectionOutcome, config: &PolicyConfig) {
        let policy = build_policy(outcome.winner, team.members(), config);
        team.set_policy(policy);
        info!(
            team = %team.team_id,
            policy = %outcome.winner,
            random_tie_break = outcome.random_tie_break,
            "Governance policy installed"
        );
    }

    /// Collect the members' ballots, select, and install the winner
    pub fn run_for_team(
        &self,
        team: &mut Team,
        agents: &AgentRoster,
        config: &PolicyConfig,
        rng: &mut dyn RngCore,
    ) -> SelectionOutcome {
        let rankings: Vec<Vec<usize>> = team
            .members()
            .iter()
            .filter_map(|id| match agents.get(id) {
                Some(agent) => Some(agent.aoa_ranking()),
                None => {
                    warn!(agent = %id, team = %team.team_id, "Ballot from unknown agent skipped");
                    None
                }
            })
            .collect();

        let outcome = self.select(&rankings, rng);
        debug!(
            team = %team.team_id,
            copeland = ?outcome.copeland_scores,
            borda = ?outcome.borda_scores,
            "Governance vote tallied"
        );
        self.install(team, &outcome, config);
        outcome
    }
}

fn top_scoring<S: Ord + Copy>(scores: &BTreeMap<usize, S>) -> Vec<usize> {
    let Some(best) = scores.values().max().copied() else {
        return Vec::new();
    };
    scores
        .iter()
        .filter(|(_, score)| **score == best)
        .map(|(option, _)| *option)
        .collect()
}
