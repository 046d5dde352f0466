use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use upstander_engine::{Choice, Node, NodeKind, StepClock};

use crate::util::stream_rng;

/// Seconds a participant spends leaving each kind of node.
#[derive(Debug, Clone)]
pub struct PacingProfile {
    pub setup: RangeInclusive<u64>,
    pub decision: RangeInclusive<u64>,
    pub followup: RangeInclusive<u64>,
    pub resolution: RangeInclusive<u64>,
}

impl Default for PacingProfile {
    /// Tuned so the bundled module averages about 25 minutes.
    fn default() -> Self {
        Self {
            setup: 30..=90,
            decision: 105..=225,
            followup: 60..=150,
            resolution: 60..=120,
        }
    }
}

impl PacingProfile {
    fn range(&self, kind: NodeKind) -> RangeInclusive<u64> {
        match kind {
            NodeKind::Setup => self.setup.clone(),
            NodeKind::Decision => self.decision.clone(),
            NodeKind::Followup => self.followup.clone(),
            NodeKind::Resolution => self.resolution.clone(),
            NodeKind::Reflection => 0..=0,
        }
    }
}

/// Journey clock drawing reading/deliberation time from a per-persona stream.
pub struct SeededStepClock {
    rng: ChaCha20Rng,
    profile: PacingProfile,
}

impl SeededStepClock {
    #[must_use]
    pub fn new(run_seed: u64, persona_id: &str, profile: PacingProfile) -> Self {
        Self {
            rng: stream_rng(run_seed, persona_id, "pacing"),
            profile,
        }
    }
}

impl StepClock for SeededStepClock {
    fn tick(&mut self, node: &Node, _choice: &Choice) -> Duration {
        let range = self.profile.range(node.kind);
        if range.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_secs(self.rng.gen_range(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstander_engine::ChoiceList;

    fn node(kind: NodeKind) -> (Node, Choice) {
        let choice = Choice {
            id: "go".into(),
            label: String::new(),
            target: "next".into(),
            skills: Default::default(),
        };
        let node = Node {
            id: "n".into(),
            kind,
            title: String::new(),
            terminal: false,
            options: ChoiceList::from_iter([choice.clone()]),
        };
        (node, choice)
    }

    #[test]
    fn ticks_stay_inside_kind_ranges() {
        let mut clock = SeededStepClock::new(5, "alex", PacingProfile::default());
        let (decision, choice) = node(NodeKind::Decision);
        for _ in 0..200 {
            let secs = clock.tick(&decision, &choice).as_secs();
            assert!((105..=225).contains(&secs));
        }
        let (reflection, choice) = node(NodeKind::Reflection);
        assert_eq!(clock.tick(&reflection, &choice), Duration::ZERO);
    }

    #[test]
    fn same_persona_same_seed_same_pace() {
        let (setup, choice) = node(NodeKind::Setup);
        let mut a = SeededStepClock::new(11, "maria", PacingProfile::default());
        let mut b = SeededStepClock::new(11, "maria", PacingProfile::default());
        let mut c = SeededStepClock::new(11, "jordan", PacingProfile::default());
        let run_a: Vec<_> = (0..8).map(|_| a.tick(&setup, &choice)).collect();
        let run_b: Vec<_> = (0..8).map(|_| b.tick(&setup, &choice)).collect();
        let run_c: Vec<_> = (0..8).map(|_| c.tick(&setup, &choice)).collect();
        assert_eq!(run_a, run_b);
        assert_ne!(run_a, run_c);
    }
}
