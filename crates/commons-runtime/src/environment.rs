//! Simulation environment: owns agents, teams, the RNG, and the turn log
//!
//! An iteration starts by reviving and resetting every agent, forming
//! teams, and letting each team vote on its governance policy. Each turn
//! then re-homes orphans, runs the turn engine over every team under the
//! registry's write lock, and periodically applies the survival threshold.

use crate::admission::{OrphanPool, TeamAdmission};
use crate::agent::{AgentRoster, CommonsAgent};
use crate::policy::build_policy;
use crate::recorder::TurnLog;
use crate::selector::{GovernanceSelector, SelectionOutcome};
use crate::team::{TeamRegistry, TeamStatus, TeamStatusHandle};
use crate::turn_engine::{TeamTurnReport, TurnEngine};
use commons_types::{
    AgentId, AgentTurnRecord, CommonsError, CommonsResult, PolicyKind, SimulationConfig, TeamId,
    TurnRecord,
};
use parking_lot::RwLock;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Environment {
    config: SimulationConfig,
    agents: AgentRoster,
    dead: BTreeSet<AgentId>,
    teams: Arc<RwLock<TeamRegistry>>,
    orphans: OrphanPool,
    admission: TeamAdmission,
    selector: GovernanceSelector,
    engine: TurnEngine,
    rng: StdRng,
    log: TurnLog,
    iteration: u32,
    turn: u32,
    survival_threshold: u64,
}

impl Environment {
    /// Create an environment; seeds the RNG from the config when set
    pub fn new(config: SimulationConfig) -> CommonsResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            admission: TeamAdmission::new(config.admission_threshold),
            survival_threshold: config.survival_threshold.unwrap_or(0),
            config,
            agents: AgentRoster::new(),
            dead: BTreeSet::new(),
            teams: Arc::new(RwLock::new(TeamRegistry::new())),
            orphans: OrphanPool::new(),
            selector: GovernanceSelector::new(),
            engine: TurnEngine::new(),
            rng,
            log: TurnLog::new(),
            iteration: 0,
            turn: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn add_agent(&mut self, agent: Box<dyn CommonsAgent>) -> AgentId {
        let id = self.agents.insert(agent);
        info!(agent = %id, "Agent added");
        id
    }

    pub fn agent(&self, agent_id: &AgentId) -> Option<&dyn CommonsAgent> {
        self.agents.get(agent_id)
    }

    pub fn agents(&self) -> &AgentRoster {
        &self.agents
    }

    pub fn is_alive(&self, agent_id: &AgentId) -> bool {
        self.agents.contains(agent_id) && !self.dead.contains(agent_id)
    }

    pub fn live_agents(&self) -> Vec<AgentId> {
        self.agents
            .ids()
            .into_iter()
            .filter(|id| !self.dead.contains(id))
            .collect()
    }

    /// Handle for reading team state from outside the turn loop
    pub fn status_handle(&self) -> TeamStatusHandle {
        TeamStatusHandle::new(self.teams.clone())
    }

    pub fn team_ids(&self) -> Vec<TeamId> {
        self.teams.read().team_ids()
    }

    pub fn team_status(&self, team_id: &TeamId) -> Option<TeamStatus> {
        self.teams.read().get(team_id).map(|t| t.status())
    }

    pub fn team_members(&self, team_id: &TeamId) -> Option<Vec<AgentId>> {
        self.teams.read().get(team_id).map(|t| t.members().to_vec())
    }

    pub fn orphans(&self) -> &OrphanPool {
        &self.orphans
    }

    pub fn turn_log(&self) -> &TurnLog {
        &self.log
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn survival_threshold(&self) -> u64 {
        self.survival_threshold
    }

    /// Form a team from live, teamless agents under the default policy
    pub fn form_team(&mut self, members: Vec<AgentId>) -> CommonsResult<TeamId> {
        let mut unique: Vec<AgentId> = Vec::with_capacity(members.len());
        for id in members {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.len() < 2 {
            return Err(CommonsError::InvalidTeam {
                reason: "a team needs at least two agents".to_string(),
            });
        }

        for id in &unique {
            let agent = self
                .agents
                .get(id)
                .ok_or_else(|| CommonsError::AgentNotFound(id.clone()))?;
            if self.dead.contains(id) {
                return Err(CommonsError::InvalidTeam {
                    reason: format!("agent {id} is dead"),
                });
            }
            if let Some(team) = agent.team_id() {
                return Err(CommonsError::AgentAlreadyInTeam {
                    agent: id.clone(),
                    team: team.clone(),
                });
            }
        }

        let team_id = self
            .teams
            .write()
            .create_team(unique.clone(), &self.config.policy);
        for id in &unique {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.set_team_id(Some(team_id.clone()));
            }
            self.orphans.remove(id);
        }
        Ok(team_id)
    }

    /// Group live teamless agents at random into teams of `team_size`.
    ///
    /// A trailing group of one stays teamless and becomes an orphan.
    pub fn form_teams(&mut self) -> Vec<TeamId> {
        let mut unteamed: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|a| a.team_id().is_none() && !self.dead.contains(a.id()))
            .map(|a| a.id().clone())
            .collect();
        unteamed.shuffle(&mut self.rng);

        let groups: Vec<Vec<AgentId>> = unteamed
            .chunks(self.config.team_size)
            .filter(|group| group.len() >= 2)
            .map(<[AgentId]>::to_vec)
            .collect();

        let mut formed = Vec::with_capacity(groups.len());
        for group in groups {
            match self.form_team(group) {
                Ok(team_id) => formed.push(team_id),
                Err(e) => warn!(error = %e, "Team formation skipped"),
            }
        }
        formed
    }

    /// Replace a team's policy with a fresh instance of `kind`
    pub fn install_policy(&mut self, team_id: &TeamId, kind: PolicyKind) -> CommonsResult<()> {
        let mut teams = self.teams.write();
        let team = teams
            .get_mut(team_id)
            .ok_or_else(|| CommonsError::TeamNotFound(team_id.clone()))?;
        let policy = build_policy(kind, team.members(), &self.config.policy);
        team.set_policy(policy);
        info!(team = %team_id, policy = %kind, "Governance policy installed");
        Ok(())
    }

    /// Run the governance vote in every team
    pub fn run_governance_selection(&mut self) -> BTreeMap<TeamId, SelectionOutcome> {
        let mut teams = self.teams.write();
        teams
            .iter_mut()
            .map(|team| {
                let outcome = self.selector.run_for_team(
                    team,
                    &self.agents,
                    &self.config.policy,
                    &mut self.rng,
                );
                (team.team_id.clone(), outcome)
            })
            .collect()
    }

    /// Start a new iteration: revive, reset, form teams, vote on policies
    pub fn run_start_of_iteration(&mut self) -> CommonsResult<()> {
        self.iteration += 1;
        self.turn = 0;
        self.survival_threshold = match self.config.survival_threshold {
            Some(threshold) => threshold,
            None => self
                .rng
                .gen_range(self.config.survival_threshold_min..self.config.survival_threshold_max),
        };

        let revived = std::mem::take(&mut self.dead);
        for id in &revived {
            info!(agent = %id, "Agent revived");
        }

        for agent in self.agents.iter_mut() {
            agent.set_true_score(self.config.initial_score);
            agent.set_team_id(None);
        }
        self.teams.write().clear();
        self.orphans.clear();

        let formed = self.form_teams();
        self.run_governance_selection();

        info!(
            iteration = self.iteration,
            teams = formed.len(),
            revived = revived.len(),
            survival_threshold = self.survival_threshold,
            "Iteration started"
        );
        Ok(())
    }

    /// Run one turn across every team
    pub fn run_turn(&mut self) -> CommonsResult<BTreeMap<TeamId, TeamTurnReport>> {
        self.turn += 1;

        for agent in self.agents.iter_mut() {
            if !self.dead.contains(agent.id()) {
                agent.begin_turn();
            }
        }

        self.offer_team_rankings();
        self.orphans.pick_up_orphans(&self.agents, &self.dead);

        let reports = {
            let mut teams = self.teams.write();
            self.admission
                .allocate_orphans(&mut self.orphans, &mut teams, &mut self.agents);
            self.engine
                .run_turn(&mut teams, &mut self.agents, &self.dead, &mut self.rng)
                .inspect_err(|e| {
                    error!(iteration = self.iteration, turn = self.turn, error = %e, "Turn aborted")
                })?
        };

        if self.turn > 1 && self.turn % self.config.threshold_turns == 0 {
            self.apply_survival_threshold();
        }

        let dead = &self.dead;
        self.teams.write().prune_empty(|id| !dead.contains(id));

        self.record_turn(&reports);
        info!(
            iteration = self.iteration,
            turn = self.turn,
            teams = reports.len(),
            alive = self.agents.len() - self.dead.len(),
            "Turn complete"
        );
        Ok(reports)
    }

    /// Empty every pool, kill team members scoring below the threshold, and
    /// reset surviving members' scores. Teamless agents are left untouched.
    /// Returns the agents that died.
    pub fn apply_survival_threshold(&mut self) -> Vec<AgentId> {
        let threshold = self.survival_threshold;
        let mut teams = self.teams.write();

        let mut died = Vec::new();
        for team in teams.iter_mut() {
            team.common_pool = 0;
            for id in team.members().to_vec() {
                if self.dead.contains(&id) {
                    continue;
                }
                let Some(agent) = self.agents.get_mut(&id) else {
                    warn!(agent = %id, team = %team.team_id, "Team member missing from roster");
                    continue;
                };
                if agent.true_score() < threshold {
                    team.remove_member(&id);
                    agent.set_team_id(None);
                    died.push(id);
                } else {
                    agent.set_true_score(0);
                }
            }
        }

        for id in &died {
            warn!(agent = %id, threshold = threshold, "Agent fell below survival threshold");
        }
        self.dead.extend(died.iter().cloned());
        died
    }

    /// Run every configured iteration and turn
    pub fn run(&mut self) -> CommonsResult<()> {
        for _ in 0..self.config.iterations {
            self.run_start_of_iteration()?;
            for _ in 0..self.config.turns_per_iteration {
                self.run_turn()?;
            }
        }
        Ok(())
    }

    /// Offer the current teams to orphans whose ranking names none of them
    fn offer_team_rankings(&mut self) {
        let team_ids = self.teams.read().team_ids();
        if team_ids.is_empty() {
            return;
        }
        for agent in self.agents.iter_mut() {
            if agent.team_id().is_some() || self.dead.contains(agent.id()) {
                continue;
            }
            if agent.team_ranking().iter().any(|t| team_ids.contains(t)) {
                continue;
            }
            let mut offer = team_ids.clone();
            offer.shuffle(&mut self.rng);
            agent.set_team_ranking(offer);
        }
    }

    fn record_turn(&mut self, reports: &BTreeMap<TeamId, TeamTurnReport>) {
        let agents = self
            .agents
            .iter()
            .map(|agent| {
                let id = agent.id();
                let mut record = AgentTurnRecord::idle(
                    id.clone(),
                    agent.true_score(),
                    agent.team_id().cloned(),
                    !self.dead.contains(id),
                );
                if let Some(activity) = reports.values().find_map(|r| r.activity.get(id)) {
                    record.contribution = activity.contribution;
                    record.stated_contribution = activity.stated_contribution;
                    record.withdrawal = activity.withdrawal;
                    record.stated_withdrawal = activity.stated_withdrawal;
                }
                record
            })
            .collect();
        let teams = self.teams.read().iter().map(|t| t.turn_record()).collect();
        self.log
            .record(TurnRecord::new(self.iteration, self.turn, agents, teams));
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("iteration", &self.iteration)
            .field("turn", &self.turn)
            .field("agents", &self.agents.len())
            .field("dead", &self.dead.len())
            .field("teams", &self.teams.read().len())
            .finish()
    }
}
