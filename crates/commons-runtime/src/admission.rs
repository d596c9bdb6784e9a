//! Orphan pool and threshold-vote team admission
//!
//! Agents without a team are swept into the orphan pool at the start of
//! every turn, then offered to the teams they prefer, in order. A team
//! admits an orphan when the share of its members voting yes reaches the
//! admission threshold.

use crate::agent::AgentRoster;
use crate::team::TeamRegistry;
use commons_types::{AgentId, TeamId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Default share of yes votes needed for admission
pub const DEFAULT_ADMISSION_THRESHOLD: f64 = 0.7;

/// Teamless agents and their team preferences, most preferred first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrphanPool {
    entries: BTreeMap<AgentId, Vec<TeamId>>,
}

impl OrphanPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an orphan or refresh its preferences
    pub fn insert(&mut self, agent_id: AgentId, preferences: Vec<TeamId>) {
        self.entries.insert(agent_id, preferences);
    }

    pub fn remove(&mut self, agent_id: &AgentId) -> Option<Vec<TeamId>> {
        self.entries.remove(agent_id)
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.entries.contains_key(agent_id)
    }

    pub fn preferences(&self, agent_id: &AgentId) -> Option<&[TeamId]> {
        self.entries.get(agent_id).map(Vec::as_slice)
    }

    pub fn orphans(&self) -> Vec<AgentId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sweep live agents; every teamless one enters the pool with its
    /// current team ranking. Returns the number of orphans in the pool.
    pub fn pick_up_orphans(&mut self, agents: &AgentRoster, dead: &BTreeSet<AgentId>) -> usize {
        self.entries.retain(|id, _| !dead.contains(id));
        for agent in agents.iter() {
            if dead.contains(agent.id()) {
                continue;
            }
            if agent.team_id().is_none() {
                self.entries.insert(agent.id().clone(), agent.team_ranking());
            } else {
                self.entries.remove(agent.id());
            }
        }
        debug!(orphans = self.entries.len(), "Orphans picked up");
        self.entries.len()
    }
}

/// Runs admission votes for orphans
#[derive(Clone, Debug)]
pub struct TeamAdmission {
    threshold: f64,
}

impl Default for TeamAdmission {
    fn default() -> Self {
        Self::new(DEFAULT_ADMISSION_THRESHOLD)
    }
}

impl TeamAdmission {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Poll every member of `team_id` on admitting `orphan_id`.
    ///
    /// Accepted iff `yes / members >= threshold`. A missing or empty team
    /// never accepts; a member whose agent is missing counts as a no.
    pub fn request_orphan_entry(
        &self,
        orphan_id: &AgentId,
        team_id: &TeamId,
        registry: &TeamRegistry,
        agents: &mut AgentRoster,
    ) -> bool {
        let Some(team) = registry.get(team_id) else {
            warn!(team = %team_id, orphan = %orphan_id, "Admission requested for unknown team");
            return false;
        };
        let member_count = team.member_count();
        if member_count == 0 {
            return false;
        }

        let mut accepted = 0usize;
        for member in team.members() {
            match agents.get_mut(member) {
                Some(agent) => {
                    if agent.vote_on_agent_entry(orphan_id) {
                        accepted += 1;
                    }
                }
                None => warn!(agent = %member, team = %team_id, "Voting member not found"),
            }
        }

        let ratio = accepted as f64 / member_count as f64;
        let admitted = ratio >= self.threshold;
        debug!(
            orphan = %orphan_id,
            team = %team_id,
            ratio = ratio,
            threshold = self.threshold,
            admitted = admitted,
            "Admission vote"
        );
        admitted
    }

    /// Offer every orphan to its preferred teams in order; the first team
    /// to accept takes it. Orphans nobody accepts stay in the pool.
    ///
    /// Returns the admissions made.
    pub fn allocate_orphans(
        &self,
        pool: &mut OrphanPool,
        registry: &mut TeamRegistry,
        agents: &mut AgentRoster,
    ) -> Vec<(AgentId, TeamId)> {
        let mut admitted = Vec::new();

        for orphan_id in pool.orphans() {
            match agents.get(&orphan_id) {
                Some(agent) if agent.team_id().is_some() => {
                    pool.remove(&orphan_id);
                    continue;
                }
                Some(_) => {}
                None => {
                    warn!(agent = %orphan_id, "Orphan not found, dropping from pool");
                    pool.remove(&orphan_id);
                    continue;
                }
            }

            let preferences = pool.preferences(&orphan_id).map(<[TeamId]>::to_vec).unwrap_or_default();
            for team_id in preferences {
                if !self.request_orphan_entry(&orphan_id, &team_id, registry, agents) {
                    continue;
                }
                if let Some(team) = registry.get_mut(&team_id) {
                    team.add_member(orphan_id.clone());
                }
                if let Some(agent) = agents.get_mut(&orphan_id) {
                    agent.set_team_id(Some(team_id.clone()));
                }
                pool.remove(&orphan_id);
                info!(agent = %orphan_id, team = %team_id, "Orphan admitted to team");
                admitted.push((orphan_id.clone(), team_id));
                break;
            }
        }

        admitted
    }
}
