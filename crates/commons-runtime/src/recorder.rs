//! Turn log: one snapshot per turn for the data recorder

use commons_types::{CommonsError, CommonsResult, TurnRecord};

#[derive(Clone, Debug, Default)]
pub struct TurnLog {
    records: Vec<TurnRecord>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: TurnRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&TurnRecord> {
        self.records.last()
    }

    /// Records belonging to one iteration
    pub fn iteration(&self, iteration: u32) -> impl Iterator<Item = &TurnRecord> {
        self.records.iter().filter(move |r| r.iteration == iteration)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the whole log as pretty-printed JSON
    pub fn to_json(&self) -> CommonsResult<String> {
        serde_json::to_string_pretty(&self.records)
            .map_err(|e| CommonsError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commons_types::{AgentId, AgentTurnRecord};

    #[test]
    fn test_log_filters_by_iteration() {
        let mut log = TurnLog::new();
        log.record(TurnRecord::new(1, 1, Vec::new(), Vec::new()));
        log.record(TurnRecord::new(1, 2, Vec::new(), Vec::new()));
        log.record(TurnRecord::new(2, 1, Vec::new(), Vec::new()));

        assert_eq!(log.len(), 3);
        assert_eq!(log.iteration(1).count(), 2);
        assert_eq!(log.latest().map(|r| r.iteration), Some(2));
    }

    #[test]
    fn test_json_export() {
        let mut log = TurnLog::new();
        let agent = AgentTurnRecord::idle(AgentId::new("a"), 7, None, true);
        log.record(TurnRecord::new(1, 1, vec![agent], Vec::new()));

        let json = log.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["agents"][0]["score"], 7);
        assert_eq!(parsed[0]["agents"][0]["alive"], true);
    }
}
