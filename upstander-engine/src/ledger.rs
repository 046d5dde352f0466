use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::SkillDeltas;

/// Per-journey skill accumulator. Values only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillLedger {
    totals: BTreeMap<String, u32>,
}

impl SkillLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every delta, creating missing skills at zero.
    pub fn apply(&mut self, deltas: &SkillDeltas) {
        for (skill, delta) in deltas {
            let total = self.totals.entry(skill.clone()).or_insert(0);
            *total = total.saturating_add(*delta);
        }
    }

    #[must_use]
    pub fn get(&self, skill: &str) -> u32 {
        self.totals.get(skill).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn snapshot(&self) -> SkillSnapshot {
        SkillSnapshot(self.totals.clone())
    }
}

/// Frozen copy of a ledger, stored on finalized journeys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillSnapshot(BTreeMap<String, u32>);

impl SkillSnapshot {
    #[must_use]
    pub fn get(&self, skill: &str) -> u32 {
        self.0.get(skill).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(skill, value)| (skill.as_str(), *value))
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|v| u64::from(*v)).sum()
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, u32>> for SkillSnapshot {
    fn from(map: BTreeMap<String, u32>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(pairs: &[(&str, u32)]) -> SkillDeltas {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn apply_accumulates_and_creates_entries() {
        let mut ledger = SkillLedger::new();
        ledger.apply(&deltas(&[("warning_signs", 1)]));
        ledger.apply(&deltas(&[("warning_signs", 2), ("distraction", 1)]));
        assert_eq!(ledger.get("warning_signs"), 3);
        assert_eq!(ledger.get("distraction"), 1);
        assert_eq!(ledger.get("know_resources"), 0);
    }

    #[test]
    fn zero_deltas_still_register_the_skill() {
        let mut ledger = SkillLedger::new();
        ledger.apply(&deltas(&[("support_survivor", 0)]));
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.iter().collect::<Vec<_>>(), vec![("support_survivor", 0)]);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let mut ledger = SkillLedger::new();
        ledger.apply(&deltas(&[("x", u32::MAX)]));
        ledger.apply(&deltas(&[("x", 5)]));
        assert_eq!(ledger.get("x"), u32::MAX);
    }

    #[test]
    fn snapshot_is_detached_from_ledger() {
        let mut ledger = SkillLedger::new();
        ledger.apply(&deltas(&[("x", 1)]));
        let before = ledger.snapshot();
        ledger.apply(&deltas(&[("x", 1)]));
        assert_eq!(before.get("x"), 1);
        assert_eq!(ledger.snapshot().total(), 2);
        assert_eq!(serde_json::to_string(&before).unwrap(), r#"{"x":1}"#);
    }
}
