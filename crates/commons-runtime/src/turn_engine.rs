//! Turn engine: one turn of contribution, audit, and withdrawal per team
//!
//! Each team runs through
//! `ContributionCollection → ContributionAudit → WithdrawalDistribution →
//! WithdrawalAudit → Done`. Teams are processed one after another; no two
//! teams' phases interleave.

use crate::agent::{AgentRoster, ContributionContext, WithdrawalContext};
use crate::messaging::broadcast_to_team;
use crate::policy::PostContributionContext;
use crate::team::{Team, TeamRegistry};
use commons_types::{AgentId, CommonsResult, TeamId, TeamMessage, Vote};
use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Phase of a team's turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    ContributionCollection,
    ContributionAudit,
    WithdrawalDistribution,
    WithdrawalAudit,
    Done,
}

impl TurnPhase {
    pub fn next(self) -> Self {
        match self {
            TurnPhase::ContributionCollection => TurnPhase::ContributionAudit,
            TurnPhase::ContributionAudit => TurnPhase::WithdrawalDistribution,
            TurnPhase::WithdrawalDistribution => TurnPhase::WithdrawalAudit,
            TurnPhase::WithdrawalAudit | TurnPhase::Done => TurnPhase::Done,
        }
    }
}

/// What one agent did during a turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentActivity {
    pub contribution: u64,
    pub stated_contribution: u64,
    pub withdrawal: u64,
    pub stated_withdrawal: u64,
}

/// A resolved audit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub target: AgentId,
    pub failed: bool,
    /// Amount taken from the pool to run the audit
    pub cost: u64,
}

/// Summary of one team's turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamTurnReport {
    pub team_id: TeamId,
    pub phase: TurnPhase,
    pub contributed: u64,
    pub withdrawn: u64,
    pub contribution_audit: Option<AuditOutcome>,
    pub withdrawal_audit: Option<AuditOutcome>,
    pub activity: BTreeMap<AgentId, AgentActivity>,
    pub final_pool: u64,
}

impl TeamTurnReport {
    fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            phase: TurnPhase::ContributionCollection,
            contributed: 0,
            withdrawn: 0,
            contribution_audit: None,
            withdrawal_audit: None,
            activity: BTreeMap::new(),
            final_pool: 0,
        }
    }
}

/// Which audit a ballot round feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuditKind {
    Contribution,
    Withdrawal,
}

/// Drives teams through their turn phases
#[derive(Clone, Debug, Default)]
pub struct TurnEngine;

impl TurnEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one turn for every team in the registry.
    ///
    /// Only a weighted selection over zero agents aborts the turn; teams
    /// already processed keep their mutations.
    pub fn run_turn(
        &self,
        registry: &mut TeamRegistry,
        agents: &mut AgentRoster,
        dead: &BTreeSet<AgentId>,
        rng: &mut dyn RngCore,
    ) -> CommonsResult<BTreeMap<TeamId, TeamTurnReport>> {
        let mut reports = BTreeMap::new();
        for team_id in registry.team_ids() {
            if let Some(report) = self.run_team_by_id(registry, &team_id, agents, dead, rng)? {
                reports.insert(team_id, report);
            }
        }
        Ok(reports)
    }

    /// Run one team's turn; a missing team is logged and skipped
    pub fn run_team_by_id(
        &self,
        registry: &mut TeamRegistry,
        team_id: &TeamId,
        agents: &mut AgentRoster,
        dead: &BTreeSet<AgentId>,
        rng: &mut dyn RngCore,
    ) -> CommonsResult<Option<TeamTurnReport>> {
        match registry.get_mut(team_id) {
            Some(team) => self.run_team_turn(team, agents, dead, rng).map(Some),
            None => {
                warn!(team = %team_id, "Team not found, skipping turn");
                Ok(None)
            }
        }
    }

    /// Run every phase of one team's turn
    pub fn run_team_turn(
        &self,
        team: &mut Team,
        agents: &mut AgentRoster,
        dead: &BTreeSet<AgentId>,
        rng: &mut dyn RngCore,
    ) -> CommonsResult<TeamTurnReport> {
        let participants = participants(team, agents, dead);
        let mut turn = TeamTurn {
            report: TeamTurnReport::new(team.team_id.clone()),
            team,
            agents,
            rng,
            participants,
        };

        while turn.report.phase != TurnPhase::Done {
            turn.step()?;
        }

        info!(
            team = %turn.team.team_id,
            contributed = turn.report.contributed,
            withdrawn = turn.report.withdrawn,
            pool = turn.team.common_pool,
            "Team turn complete"
        );
        Ok(turn.report)
    }
}

/// Live members whose agent exists and still belongs to the team
fn participants(team: &Team, agents: &AgentRoster, dead: &BTreeSet<AgentId>) -> Vec<AgentId> {
    team.members()
        .iter()
        .filter(|id| {
            if dead.contains(*id) {
                return false;
            }
            match agents.get(id) {
                Some(agent) => agent.team_id() == Some(&team.team_id),
                None => {
                    warn!(agent = %id, team = %team.team_id, "Member not found, skipping");
                    false
                }
            }
        })
        .cloned()
        .collect()
}

/// In-flight state of one team's turn
struct TeamTurn<'a> {
    team: &'a mut Team,
    agents: &'a mut AgentRoster,
    rng: &'a mut dyn RngCore,
    participants: Vec<AgentId>,
    report: TeamTurnReport,
}

impl TeamTurn<'_> {
    fn step(&mut self) -> CommonsResult<()> {
        match self.report.phase {
            TurnPhase::ContributionCollection => self.collect_contributions(),
            TurnPhase::ContributionAudit => self.contribution_audit()?,
            TurnPhase::WithdrawalDistribution => self.distribute_withdrawals(),
            TurnPhase::WithdrawalAudit => self.withdrawal_audit(),
            TurnPhase::Done => {}
        }
        self.report.phase = self.report.phase.next();
        Ok(())
    }

    fn collect_contributions(&mut self) {
        // Agents see only the pool carried over from the previous turn
        let visible_pool = self.team.common_pool;
        let mut total: u64 = 0;

        for id in self.participants.clone() {
            let Some(agent) = self.agents.get_mut(&id) else {
                continue;
            };
            let score = agent.true_score();
            let expected = self.team.policy().expected_contribution(&id, score).min(score);
            let declaration = agent.decide_contribution(&ContributionContext {
                team_id: &self.team.team_id,
                expected,
                visible_pool,
            });
            let actual = declaration.actual.min(score);

            self.team
                .policy_mut()
                .set_contribution_audit_result(&id, score, actual, declaration.stated);
            agent.set_true_score(score - actual);
            total = total.saturating_add(actual);

            let activity = self.report.activity.entry(id.clone()).or_default();
            activity.contribution = actual;
            activity.stated_contribution = declaration.stated;

            debug!(
                agent = %id,
                expected = expected,
                actual = actual,
                stated = declaration.stated,
                "Contribution collected"
            );

            let message = TeamMessage::ContributionStated {
                from: id.clone(),
                stated: declaration.stated,
                expected,
            };
            broadcast_to_team(self.agents, &self.participants, Some(&id), &message);
        }

        self.team.common_pool = self.team.common_pool.saturating_add(total);
        self.report.contributed = total;
    }

    fn contribution_audit(&mut self) -> CommonsResult<()> {
        self.report.contribution_audit = self.run_audit(AuditKind::Contribution);

        if self.participants.is_empty() {
            return Ok(());
        }
        let team_id = self.team.team_id.clone();
        let ctx = PostContributionContext {
            team_id: &team_id,
            members: &self.participants,
            common_pool: self.team.common_pool,
        };
        self.team
            .policy_mut()
            .run_post_contribution(&ctx, self.agents, &mut *self.rng)
    }

    fn distribute_withdrawals(&mut self) {
        let pool_before = self.team.common_pool;
        let order = self
            .team
            .policy()
            .withdrawal_order(&self.participants, &mut *self.rng);

        for id in order {
            let Some(agent) = self.agents.get_mut(&id) else {
                continue;
            };
            let score = agent.true_score();
            let live_pool = self.team.common_pool;
            let expected = self
                .team
                .policy()
                .expected_withdrawal(&id, score, live_pool);
            let declaration = agent.decide_withdrawal(&WithdrawalContext {
                team_id: &self.team.team_id,
                expected,
                live_pool,
            });
            let actual = declaration.actual.min(live_pool);

            self.team.policy_mut().set_withdrawal_audit_result(
                &id,
                score,
                actual,
                declaration.stated,
                pool_before,
            );
            agent.set_true_score(score.saturating_add(actual));
            self.team.common_pool = live_pool - actual;
            self.report.withdrawn += actual;

            let activity = self.report.activity.entry(id.clone()).or_default();
            activity.withdrawal = actual;
            activity.stated_withdrawal = declaration.stated;

            debug!(
                agent = %id,
                expected = expected,
                actual = actual,
                stated = declaration.stated,
                pool = self.team.common_pool,
                "Withdrawal made"
            );
        }

        let mut broadcast_order = self.participants.clone();
        broadcast_order.shuffle(&mut *self.rng);
        for id in broadcast_order {
            let Some(activity) = self.report.activity.get(&id).copied() else {
                continue;
            };
            let expected = self
                .team
                .policy()
                .expected_withdrawal(&id, 0, pool_before);
            let message = TeamMessage::WithdrawalStated {
                from: id.clone(),
                stated: activity.stated_withdrawal,
                expected,
            };
            broadcast_to_team(self.agents, &self.participants, Some(&id), &message);
        }
    }

    fn withdrawal_audit(&mut self) {
        self.report.withdrawal_audit = self.run_audit(AuditKind::Withdrawal);
        self.report.final_pool = self.team.common_pool;
    }

    /// Collect ballots, resolve a target, charge the pool, and broadcast
    fn run_audit(&mut self, kind: AuditKind) -> Option<AuditOutcome> {
        let mut votes: Vec<Vote> = Vec::with_capacity(self.participants.len());
        for id in &self.participants {
            if let Some(agent) = self.agents.get_mut(id) {
                votes.push(match kind {
                    AuditKind::Contribution => agent.contribution_audit_vote(&self.participants),
                    AuditKind::Withdrawal => agent.withdrawal_audit_vote(&self.participants),
                });
            }
        }

        let policy = self.team.policy_mut();
        policy.negotiate_audit_duration(&votes);
        let target = policy.vote_result(&votes)?;
        if !self.participants.contains(&target) {
            warn!(
                team = %self.team.team_id,
                target = %target,
                "Audit target is not a participating member"
            );
            return None;
        }

        let cost = self
            .team
            .policy()
            .audit_cost(self.team.common_pool)
            .min(self.team.common_pool);
        self.team.common_pool -= cost;

        let policy = self.team.policy_mut();
        let (failed, message) = match kind {
            AuditKind::Contribution => {
                let failed = policy.contribution_audit_result(&target);
                let message = TeamMessage::ContributionAuditResult {
                    target: target.clone(),
                    failed,
                };
                (failed, message)
            }
            AuditKind::Withdrawal => {
                let failed = policy.withdrawal_audit_result(&target);
                let message = TeamMessage::WithdrawalAuditResult {
                    target: target.clone(),
                    failed,
                };
                (failed, message)
            }
        };

        if failed {
            warn!(team = %self.team.team_id, target = %target, audit = ?kind, "Audit failed");
        } else {
            info!(team = %self.team.team_id, target = %target, audit = ?kind, "Audit passed");
        }
        broadcast_to_team(self.agents, &self.participants, None, &message);

        Some(AuditOutcome {
            target,
            failed,
            cost,
        })
    }
}
