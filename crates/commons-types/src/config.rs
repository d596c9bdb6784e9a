//! Simulation configuration types

use crate::errors::{CommonsError, CommonsResult};
use serde::{Deserialize, Serialize};

/// Configuration for one simulation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of agents seeded by the driver
    pub agent_count: usize,
    /// Target team size used by random team formation
    pub team_size: usize,
    /// Number of iterations
    pub iterations: u32,
    /// Turns per iteration
    pub turns_per_iteration: u32,
    /// The survival threshold is applied every `threshold_turns` turns
    pub threshold_turns: u32,
    /// Fixed survival threshold; drawn per iteration when absent
    pub survival_threshold: Option<u64>,
    /// Lower bound (inclusive) of the drawn survival threshold
    pub survival_threshold_min: u64,
    /// Upper bound (exclusive) of the drawn survival threshold
    pub survival_threshold_max: u64,
    /// Fraction of yes votes a team needs to admit an orphan
    pub admission_threshold: f64,
    /// Score every agent starts an iteration with
    pub initial_score: u64,
    /// Score the baseline agent earns at the start of every turn
    pub agent_income: u64,
    /// RNG seed; entropy-seeded when absent
    pub seed: Option<u64>,
    /// Governance policy parameters
    pub policy: PolicyConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agent_count: 12,
            team_size: 4,
            iterations: 3,
            turns_per_iteration: 10,
            threshold_turns: 3,
            survival_threshold: None,
            survival_threshold_min: 10,
            survival_threshold_max: 20,
            admission_threshold: 0.7,
            initial_score: 0,
            agent_income: 10,
            seed: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Validate configuration
    pub fn validate(&self) -> CommonsResult<()> {
        if self.team_size < 2 {
            return Err(CommonsError::InvalidConfiguration {
                reason: "team_size must be at least 2".to_string(),
            });
        }

        if self.threshold_turns == 0 {
            return Err(CommonsError::InvalidConfiguration {
                reason: "threshold_turns must be greater than 0".to_string(),
            });
        }

        if self.survival_threshold.is_none()
            && self.survival_threshold_min >= self.survival_threshold_max
        {
            return Err(CommonsError::InvalidConfiguration {
                reason: "survival_threshold_min must be below survival_threshold_max".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.admission_threshold) {
            return Err(CommonsError::InvalidConfiguration {
                reason: "admission_threshold must be between 0 and 1".to_string(),
            });
        }

        self.policy.validate()?;

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> CommonsResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| CommonsError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document
    pub fn to_toml_string(&self) -> CommonsResult<String> {
        toml::to_string_pretty(self).map_err(|e| CommonsError::Serialization(e.to_string()))
    }

    /// Small deterministic configuration for tests
    pub fn test_config() -> Self {
        Self {
            agent_count: 6,
            team_size: 3,
            iterations: 1,
            turns_per_iteration: 4,
            survival_threshold: Some(0),
            seed: Some(7),
            ..Self::default()
        }
    }
}

/// Parameters of the governance policy variants
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Audit window length shared by every variant
    pub audit_duration: usize,

    // Fixed
    /// Flat withdrawal entitlement
    pub fixed_withdrawal: u64,

    // Rank-tiered
    /// Contribution needed to hold rank; also the rank step size
    pub rank_threshold: u64,
    pub min_rank: u32,
    pub max_rank: u32,
    /// Extra weight added to the rank sum when splitting the pool
    pub rank_pool_weight: u64,
    /// Audit charge per slot of the audit window
    pub rank_audit_slot_cost: u64,
    /// Chairs elected every turn to agree on rank updates
    pub chair_count: usize,
    /// Consensus rounds before chairs give up for the turn
    pub max_chair_rounds: u32,

    // Leader-weighted
    pub leader_share_percent: u64,
    pub member_share_percent: u64,
    /// Ballot weight of the leader
    pub leader_vote_weight: u32,

    // Need-based
    pub need_contribution_percent: u64,
    /// Scale applied to the mean score when computing the need threshold
    pub need_alpha: f64,
    pub need_audit_percent: u64,
    /// Consecutive honest contributions that earn a bonus
    pub honest_streak_for_bonus: u32,
    pub bonus_percent: u64,
    /// Failed audits after which a member is flagged for expulsion
    pub expulsion_strikes: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            audit_duration: 5,
            fixed_withdrawal: 2,
            rank_threshold: 5,
            min_rank: 1,
            max_rank: 5,
            rank_pool_weight: 5,
            rank_audit_slot_cost: 1,
            chair_count: 2,
            max_chair_rounds: 3,
            leader_share_percent: 25,
            member_share_percent: 10,
            leader_vote_weight: 2,
            need_contribution_percent: 75,
            need_alpha: 0.7,
            need_audit_percent: 5,
            honest_streak_for_bonus: 3,
            bonus_percent: 5,
            expulsion_strikes: 3,
        }
    }
}

impl PolicyConfig {
    /// Validate policy parameters
    pub fn validate(&self) -> CommonsResult<()> {
        if self.audit_duration == 0 {
            return Err(CommonsError::InvalidConfiguration {
                reason: "audit_duration must be greater than 0".to_string(),
            });
        }

        if self.min_rank == 0 || self.min_rank > self.max_rank {
            return Err(CommonsError::InvalidConfiguration {
                reason: "rank bounds must satisfy 1 <= min_rank <= max_rank".to_string(),
            });
        }

        if self.chair_count == 0 || self.max_chair_rounds == 0 {
            return Err(CommonsError::InvalidConfiguration {
                reason: "chair_count and max_chair_rounds must be greater than 0".to_string(),
            });
        }

        if !(0.5..=0.8).contains(&self.need_alpha) {
            return Err(CommonsError::InvalidConfiguration {
                reason: format!("need_alpha must lie in [0.5, 0.8], got {}", self.need_alpha),
            });
        }

        for (name, percent) in [
            ("leader_share_percent", self.leader_share_percent),
            ("member_share_percent", self.member_share_percent),
            ("need_contribution_percent", self.need_contribution_percent),
            ("need_audit_percent", self.need_audit_percent),
            ("bonus_percent", self.bonus_percent),
        ] {
            if percent > 100 {
                return Err(CommonsError::InvalidConfiguration {
                    reason: format!("{name} must not exceed 100"),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(SimulationConfig::test_config().validate().is_ok());
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let mut config = SimulationConfig::default();
        config.policy.need_alpha = 0.9;
        assert!(matches!(
            config.validate(),
            Err(CommonsError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_rank_bounds_rejected() {
        let policy = PolicyConfig {
            min_rank: 0,
            ..PolicyConfig::default()
        };
        assert!(policy.validate().is_err());

        let policy = PolicyConfig {
            min_rank: 4,
            max_rank: 3,
            ..PolicyConfig::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_team_size_rejected() {
        let config = SimulationConfig {
            team_size: 1,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            iterations = 7
            seed = 42

            [policy]
            need_alpha = 0.6
            "#,
        )
        .unwrap();
        assert_eq!(config.iterations, 7);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.policy.need_alpha, 0.6);
        assert_eq!(config.policy.rank_threshold, 5);
        assert_eq!(config.admission_threshold, 0.7);
    }

    #[test]
    fn test_invalid_toml_reported() {
        let err = SimulationConfig::from_toml_str("iterations = \"many\"").unwrap_err();
        assert!(matches!(err, CommonsError::ConfigParse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SimulationConfig::test_config();
        let rendered = config.to_toml_string().unwrap();
        let parsed = SimulationConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
