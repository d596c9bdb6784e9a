//! Teams and the team registry
//!
//! A team's pool and member list are mutated only by the turn engine,
//! governance selection, and admission. External readers go through
//! [`TeamStatusHandle`], which takes a read lock on the registry.

use crate::policy::{build_policy, GovernancePolicy};
use commons_types::{AgentId, PolicyConfig, PolicyKind, TeamId, TeamTurnRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// A team: ordered duplicate-free members, a common pool, and one policy
#[derive(Debug)]
pub struct Team {
    pub team_id: TeamId,
    members: Vec<AgentId>,
    pub common_pool: u64,
    policy: Box<dyn GovernancePolicy>,
}

impl Team {
    pub fn new(team_id: TeamId, members: Vec<AgentId>, policy: Box<dyn GovernancePolicy>) -> Self {
        let mut team = Self {
            team_id,
            members: Vec::with_capacity(members.len()),
            common_pool: 0,
            policy,
        };
        for member in members {
            team.add_member(member);
        }
        team
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.members.contains(agent_id)
    }

    /// Append a member; returns false if it was already present
    pub fn add_member(&mut self, agent_id: AgentId) -> bool {
        if self.contains(&agent_id) {
            return false;
        }
        self.members.push(agent_id);
        true
    }

    /// Remove a member; returns false if it was not present
    pub fn remove_member(&mut self, agent_id: &AgentId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != agent_id);
        self.members.len() != before
    }

    pub fn policy(&self) -> &dyn GovernancePolicy {
        self.policy.as_ref()
    }

    pub fn policy_mut(&mut self) -> &mut dyn GovernancePolicy {
        self.policy.as_mut()
    }

    /// Install a new policy, discarding the previous instance
    pub fn set_policy(&mut self, policy: Box<dyn GovernancePolicy>) {
        self.policy = policy;
    }

    pub fn status(&self) -> TeamStatus {
        TeamStatus {
            team_id: self.team_id.clone(),
            common_pool: self.common_pool,
            policy: self.policy.kind(),
            member_count: self.members.len(),
        }
    }

    pub fn turn_record(&self) -> TeamTurnRecord {
        TeamTurnRecord {
            team_id: self.team_id.clone(),
            common_pool: self.common_pool,
            policy: self.policy.kind(),
            members: self.members.clone(),
        }
    }
}

/// Arena of teams keyed by id
#[derive(Debug, Default)]
pub struct TeamRegistry {
    teams: BTreeMap<TeamId, Team>,
    created: u64,
}

impl TeamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a team under the default policy and return its id.
    ///
    /// Ids are sequential so that iteration order follows creation order.
    pub fn create_team(&mut self, members: Vec<AgentId>, config: &PolicyConfig) -> TeamId {
        self.created += 1;
        let team_id = TeamId::new(format!("team-{:04}", self.created));
        let policy = build_policy(PolicyKind::default(), &members, config);
        let team = Team::new(team_id.clone(), members, policy);
        info!(
            team = %team_id,
            members = team.member_count(),
            "Team created"
        );
        self.teams.insert(team_id.clone(), team);
        team_id
    }

    /// Insert a pre-built team, replacing any team with the same id
    pub fn insert(&mut self, team: Team) {
        self.teams.insert(team.team_id.clone(), team);
    }

    pub fn get(&self, team_id: &TeamId) -> Option<&Team> {
        self.teams.get(team_id)
    }

    pub fn get_mut(&mut self, team_id: &TeamId) -> Option<&mut Team> {
        self.teams.get_mut(team_id)
    }

    pub fn remove(&mut self, team_id: &TeamId) -> Option<Team> {
        self.teams.remove(team_id)
    }

    pub fn contains(&self, team_id: &TeamId) -> bool {
        self.teams.contains_key(team_id)
    }

    pub fn team_ids(&self) -> Vec<TeamId> {
        self.teams.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Team> {
        self.teams.values_mut()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn clear(&mut self) {
        self.teams.clear();
    }

    /// Destroy teams with no live members; returns the removed ids
    pub fn prune_empty<F>(&mut self, is_alive: F) -> Vec<TeamId>
    where
        F: Fn(&AgentId) -> bool,
    {
        let empty: Vec<TeamId> = self
            .teams
            .values()
            .filter(|team| !team.members().iter().any(&is_alive))
            .map(|team| team.team_id.clone())
            .collect();
        for team_id in &empty {
            self.teams.remove(team_id);
            info!(team = %team_id, "Team dissolved");
        }
        empty
    }
}

/// Point-in-time summary of a team
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStatus {
    pub team_id: TeamId,
    pub common_pool: u64,
    pub policy: PolicyKind,
    pub member_count: usize,
}

/// Read-only view of the team registry for status reporting
#[derive(Clone, Debug)]
pub struct TeamStatusHandle {
    teams: Arc<RwLock<TeamRegistry>>,
}

impl TeamStatusHandle {
    pub fn new(teams: Arc<RwLock<TeamRegistry>>) -> Self {
        Self { teams }
    }

    /// Consistent snapshot of every team
    pub fn snapshot(&self) -> Vec<TeamStatus> {
        self.teams.read().iter().map(Team::status).collect()
    }

    pub fn team(&self, team_id: &TeamId) -> Option<TeamStatus> {
        self.teams.read().get(team_id).map(Team::status)
    }

    pub fn team_count(&self) -> usize {
        self.teams.read().len()
    }

    /// Sum of every team's pool
    pub fn total_pool(&self) -> u64 {
        self.teams.read().iter().map(|t| t.common_pool).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n)).collect()
    }

    #[test]
    fn test_members_are_deduplicated_in_order() {
        let policy = build_policy(PolicyKind::Fixed, &[], &PolicyConfig::default());
        let mut team = Team::new(TeamId::new("t"), ids(&["b", "a", "b"]), policy);
        assert_eq!(team.members(), ids(&["b", "a"]).as_slice());
        assert!(!team.add_member(AgentId::new("a")));
        assert!(team.add_member(AgentId::new("c")));
        assert!(team.remove_member(&AgentId::new("b")));
        assert!(!team.remove_member(&AgentId::new("b")));
        assert_eq!(team.members(), ids(&["a", "c"]).as_slice());
    }

    #[test]
    fn test_create_team_uses_default_policy() {
        let mut registry = TeamRegistry::new();
        let team_id = registry.create_team(ids(&["a", "b"]), &PolicyConfig::default());
        let team = registry.get(&team_id).unwrap();
        assert_eq!(team.policy().kind(), PolicyKind::Fixed);
        assert_eq!(team.common_pool, 0);
    }

    #[test]
    fn test_created_ids_follow_creation_order() {
        let mut registry = TeamRegistry::new();
        let first = registry.create_team(ids(&["a", "b"]), &PolicyConfig::default());
        registry.clear();
        let second = registry.create_team(ids(&["c", "d"]), &PolicyConfig::default());
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_prune_empty_teams() {
        let mut registry = TeamRegistry::new();
        let live = registry.create_team(ids(&["a", "b"]), &PolicyConfig::default());
        let dead = registry.create_team(ids(&["c"]), &PolicyConfig::default());
        let removed = registry.prune_empty(|id| id.0 != "c");
        assert_eq!(removed, vec![dead.clone()]);
        assert!(registry.contains(&live));
        assert!(!registry.contains(&dead));
    }

    #[test]
    fn test_status_handle_reads_registry() {
        let teams = Arc::new(RwLock::new(TeamRegistry::new()));
        let handle = TeamStatusHandle::new(teams.clone());
        let team_id = teams
            .write()
            .create_team(ids(&["a", "b"]), &PolicyConfig::default());
        if let Some(team) = teams.write().get_mut(&team_id) {
            team.common_pool = 12;
        }

        assert_eq!(handle.team_count(), 1);
        assert_eq!(handle.total_pool(), 12);
        let status = handle.team(&team_id).unwrap();
        assert_eq!(status.member_count, 2);
        assert_eq!(status.policy, PolicyKind::Fixed);
    }
}
