//! Messages exchanged between teammates during a turn

use crate::AgentId;
use serde::{Deserialize, Serialize};

/// A notification broadcast to every teammate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamMessage {
    /// A member states how much it contributed this turn
    ContributionStated {
        from: AgentId,
        stated: u64,
        expected: u64,
    },
    /// A member states how much it withdrew this turn
    WithdrawalStated {
        from: AgentId,
        stated: u64,
        expected: u64,
    },
    /// Outcome of a contribution audit
    ContributionAuditResult { target: AgentId, failed: bool },
    /// Outcome of a withdrawal audit
    WithdrawalAuditResult { target: AgentId, failed: bool },
}

impl TeamMessage {
    /// Agent that sent the message, if it was sent by a member
    pub fn sender(&self) -> Option<&AgentId> {
        match self {
            TeamMessage::ContributionStated { from, .. }
            | TeamMessage::WithdrawalStated { from, .. } => Some(from),
            TeamMessage::ContributionAuditResult { .. }
            | TeamMessage::WithdrawalAuditResult { .. } => None,
        }
    }
}
