//! Identity types for agents and teams

use serde::{Deserialize, Serialize};

/// Unique identifier for an agent taking part in the simulation
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Generate a new random AgentId
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create an AgentId from a known string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short display form (first 8 chars)
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a team
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    /// Generate a new random TeamId
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create a TeamId from a known string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short display form (first 8 chars)
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = AgentId::generate();
        let b = AgentId::generate();
        assert_ne!(a, b);
        assert_ne!(TeamId::generate(), TeamId::generate());
    }

    #[test]
    fn test_short_form() {
        let id = TeamId::new("0123456789abcdef");
        assert_eq!(id.short(), "01234567");
        assert_eq!(AgentId::new("abc").short(), "abc");
        assert_eq!(id.to_string(), "0123456789abcdef");
    }
}
