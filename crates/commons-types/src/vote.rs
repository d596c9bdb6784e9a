//! Ballots cast by agents for audit-target selection

use crate::AgentId;
use serde::{Deserialize, Serialize};

/// How a ballot was cast
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteStance {
    /// Did not take part; excluded from every tally
    Abstain,
    /// Voted, but against auditing anyone
    Against,
    /// Voted to audit `voted_for` with the given weight
    Favor { weight: u32 },
}

/// A single ballot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub stance: VoteStance,
    pub voter_id: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted_for: Option<AgentId>,
    /// Proposed audit window length, if the voter has an opinion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_duration: Option<usize>,
}

impl Vote {
    /// Abstaining ballot
    pub fn abstain(voter_id: AgentId) -> Self {
        Self {
            stance: VoteStance::Abstain,
            voter_id,
            voted_for: None,
            audit_duration: None,
        }
    }

    /// Ballot against auditing anyone
    pub fn against(voter_id: AgentId) -> Self {
        Self {
            stance: VoteStance::Against,
            voter_id,
            voted_for: None,
            audit_duration: None,
        }
    }

    /// Single-weight ballot to audit `target`
    pub fn favor(voter_id: AgentId, target: AgentId) -> Self {
        Self::weighted(voter_id, target, 1)
    }

    /// Weighted ballot to audit `target`
    pub fn weighted(voter_id: AgentId, target: AgentId, weight: u32) -> Self {
        Self {
            stance: VoteStance::Favor { weight },
            voter_id,
            voted_for: Some(target),
            audit_duration: None,
        }
    }

    /// Attach an audit window proposal
    pub fn with_audit_duration(mut self, duration: usize) -> Self {
        self.audit_duration = Some(duration);
        self
    }

    /// Whether this ballot takes part in tallies
    pub fn is_abstain(&self) -> bool {
        matches!(self.stance, VoteStance::Abstain)
    }

    /// Weight this ballot carries in the non-abstaining total
    pub fn weight(&self) -> u32 {
        match self.stance {
            VoteStance::Abstain => 0,
            VoteStance::Against => 1,
            VoteStance::Favor { weight } => weight,
        }
    }

    /// Candidate this ballot supports, if it is a favorable vote
    pub fn supported_candidate(&self) -> Option<&AgentId> {
        match self.stance {
            VoteStance::Favor { weight } if weight > 0 => self.voted_for.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_weights() {
        let v = AgentId::new("v");
        let t = AgentId::new("t");
        assert_eq!(Vote::abstain(v.clone()).weight(), 0);
        assert_eq!(Vote::against(v.clone()).weight(), 1);
        assert_eq!(Vote::weighted(v.clone(), t.clone(), 2).weight(), 2);
        assert!(Vote::abstain(v.clone()).is_abstain());
        assert_eq!(
            Vote::favor(v.clone(), t.clone()).supported_candidate(),
            Some(&t)
        );
        assert_eq!(Vote::against(v).supported_candidate(), None);
    }

    #[test]
    fn test_audit_duration_proposal() {
        let vote = Vote::favor(AgentId::new("v"), AgentId::new("t")).with_audit_duration(4);
        assert_eq!(vote.audit_duration, Some(4));
    }
}
