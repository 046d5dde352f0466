use serde::{Deserialize, Serialize};

use super::JourneyRecord;

/// Ordered collection of finalized journeys; the aggregation input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyStore(Vec<JourneyRecord>);

impl JourneyStore {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, record: JourneyRecord) {
        self.0.push(record);
    }

    /// Load a store previously written with `serde_json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a list of journey records.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&JourneyRecord> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JourneyRecord> {
        self.0.iter()
    }

    pub fn completed(&self) -> impl Iterator<Item = &JourneyRecord> {
        self.0.iter().filter(|record| record.completed())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<JourneyRecord> {
        self.0
    }
}

impl Extend<JourneyRecord> for JourneyStore {
    fn extend<I: IntoIterator<Item = JourneyRecord>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<JourneyRecord> for JourneyStore {
    fn from_iter<I: IntoIterator<Item = JourneyRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a JourneyStore {
    type Item = &'a JourneyRecord;
    type IntoIter = std::slice::Iter<'a, JourneyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for JourneyStore {
    type Item = JourneyRecord;
    type IntoIter = std::vec::IntoIter<JourneyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::JourneyOutcome;
    use crate::ledger::SkillSnapshot;
    use std::time::Duration;

    fn record(id: &str, outcome: JourneyOutcome) -> JourneyRecord {
        JourneyRecord::new(
            id.into(),
            "start".into(),
            vec!["start".into()],
            Vec::new(),
            SkillSnapshot::default(),
            outcome,
            Duration::ZERO,
        )
    }

    #[test]
    fn keeps_insertion_order_and_filters_completed() {
        let mut store = JourneyStore::new();
        store.push(record("a", JourneyOutcome::Completed));
        store.extend([record(
            "b",
            JourneyOutcome::StepBudgetExhausted { budget: 1 },
        )]);
        assert_eq!(store.len(), 2);
        let ids: Vec<_> = store.iter().map(JourneyRecord::persona_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.completed().count(), 1);
    }

    #[test]
    fn json_reload_preserves_records() {
        let store: JourneyStore = [
            record("a", JourneyOutcome::Completed),
            record(
                "b",
                JourneyOutcome::PolicyTimedOut {
                    node: "start".into(),
                    after: Duration::from_millis(250),
                },
            ),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(JourneyStore::from_json(&json).unwrap(), store);
    }
}
