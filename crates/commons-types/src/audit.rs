//! Audit record: per-agent windowed infraction history
//!
//! Every contribution adds one entry per agent. A withdrawal infraction is
//! folded into that same entry so a turn is audited as one combined event.
//! Only the most recent `duration` entries are ever summed.

use crate::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default audit window length
pub const DEFAULT_AUDIT_DURATION: usize = 5;

/// Windowed infraction history for every agent a policy has audited
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Stored history per agent (oldest first)
    entries: BTreeMap<AgentId, Vec<u32>>,
    /// Window size
    duration: usize,
    /// Cost per window slot
    cost_per_slot: u64,
    /// Derived audit cost
    cost: u64,
}

impl AuditRecord {
    /// Create a record with the given window size; cost equals the window size
    pub fn new(duration: usize) -> Self {
        Self::with_cost_per_slot(duration, 1)
    }

    /// Create a record whose cost is `duration * cost_per_slot`
    pub fn with_cost_per_slot(duration: usize, cost_per_slot: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            duration,
            cost_per_slot,
            cost: duration as u64 * cost_per_slot,
        }
    }

    /// Append one entry to the agent's history
    pub fn add_record(&mut self, agent_id: &AgentId, infraction: bool) {
        self.entries
            .entry(agent_id.clone())
            .or_default()
            .push(u32::from(infraction));
    }

    /// Sum of the last `min(duration, len)` entries; 0 for unknown agents
    pub fn get_all_infractions(&self, agent_id: &AgentId) -> u32 {
        self.entries
            .get(agent_id)
            .map(|records| {
                let visible = records.len().min(self.duration);
                records[records.len() - visible..].iter().sum()
            })
            .unwrap_or(0)
    }

    /// Empty the agent's stored history
    pub fn clear_all_infractions(&mut self, agent_id: &AgentId) {
        self.entries.entry(agent_id.clone()).or_default().clear();
    }

    /// Add one infraction to the most recent entry.
    ///
    /// With no history yet, a fresh entry holding the infraction is pushed.
    pub fn increment_last_record(&mut self, agent_id: &AgentId) {
        let records = self.entries.entry(agent_id.clone()).or_default();
        match records.last_mut() {
            Some(last) => *last += 1,
            None => records.push(1),
        }
    }

    /// Change the window size and recompute the cost
    pub fn set_audit_duration(&mut self, duration: usize) {
        self.duration = duration;
        self.cost = duration as u64 * self.cost_per_slot;
    }

    /// Current window size
    pub fn duration(&self) -> usize {
        self.duration
    }

    /// Derived audit cost
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// Most recent entry for the agent, if any
    pub fn last_record(&self, agent_id: &AgentId) -> Option<u32> {
        self.entries.get(agent_id).and_then(|r| r.last().copied())
    }

    /// Number of stored entries for the agent (including ones outside the window)
    pub fn history_len(&self, agent_id: &AgentId) -> usize {
        self.entries.get(agent_id).map_or(0, Vec::len)
    }

    /// Agents with a history entry
    pub fn tracked_agents(&self) -> impl Iterator<Item = &AgentId> {
        self.entries.keys()
    }
}

impl Default for AuditRecord {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_DURATION)
    }
}
