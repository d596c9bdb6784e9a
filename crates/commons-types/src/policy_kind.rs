//! The closed set of governance variants a team can run

use serde::{Deserialize, Serialize};

/// Governance policy variant, indexed by its ballot option number
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PolicyKind {
    /// Contribute the full score, withdraw a flat amount, free audits
    #[default]
    Fixed,
    /// Contribution raises rank, withdrawal entitlement scales with rank
    RankTiered,
    /// A leader draws a larger share and casts a double-weight ballot
    LeaderWeighted,
    /// Withdrawals follow a need-based allocation computed each turn
    NeedBased,
}

impl PolicyKind {
    /// Every variant in ballot order
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::Fixed,
        PolicyKind::RankTiered,
        PolicyKind::LeaderWeighted,
        PolicyKind::NeedBased,
    ];

    /// Number of ballot options
    pub const COUNT: usize = Self::ALL.len();

    /// Map a ballot option to a policy; unknown options fall back to Fixed
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(PolicyKind::Fixed)
    }

    /// Ballot option number
    pub fn index(self) -> usize {
        match self {
            PolicyKind::Fixed => 0,
            PolicyKind::RankTiered => 1,
            PolicyKind::LeaderWeighted => 2,
            PolicyKind::NeedBased => 3,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::Fixed => "fixed",
            PolicyKind::RankTiered => "rank-tiered",
            PolicyKind::LeaderWeighted => "leader-weighted",
            PolicyKind::NeedBased => "need-based",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
