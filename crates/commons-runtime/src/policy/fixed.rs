//! Fixed policy: contribute everything, withdraw a flat amount

use super::GovernancePolicy;
use commons_types::{AgentId, AuditRecord, PolicyConfig, PolicyKind};

/// The default policy every new team starts under
#[derive(Clone, Debug)]
pub struct FixedPolicy {
    record: AuditRecord,
    withdrawal: u64,
}

impl FixedPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            record: AuditRecord::new(config.audit_duration),
            withdrawal: config.fixed_withdrawal,
        }
    }
}

impl GovernancePolicy for FixedPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Fixed
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
        _agent_score: u64,
        actual: u64,
        stated: u64,
    ) {
        self.record.add_record(agent_id, stated > actual);
    }

    fn expected_withdrawal(&self, _agent_id: &AgentId, _agent_score: u64, common_pool: u64) -> u64 {
        self.withdrawal.min(common_pool)
    }

    fn set_withdrawal_audit_result(
        &mut self,
        agent_id: &AgentId,
        _agent_score: u64,
        actual: u64,
        stated: u64,
        _common_pool: u64,
    ) {
        if actual > stated || actual > self.withdrawal {
            self.record.increment_last_record(agent_id);
        }
    }

    fn audit_cost(&self, _common_pool: u64) -> u64 {
        0
    }
}
