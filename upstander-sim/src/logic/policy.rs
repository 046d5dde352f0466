use std::fmt;

use clap::ValueEnum;
use rand::Rng;
use upstander_engine::{
    AttributeKey, Choice, DecisionPolicy, FirstOptionPolicy, Node, Persona, PolicyError,
};

use crate::util::stream_rng;

/// Built-in decision strategies for synthetic runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Strategy {
    /// Always take the first listed option
    FirstOption,
    /// Prefer skills that match the persona's comfort with confrontation
    TraitAligned,
    /// Uniform choice, seeded per persona and node
    SeededRandom,
}

impl Strategy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Strategy::FirstOption => "First Option",
            Strategy::TraitAligned => "Trait Aligned",
            Strategy::SeededRandom => "Seeded Random",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn DecisionPolicy> {
        match self {
            Strategy::FirstOption => Box::new(FirstOptionPolicy),
            Strategy::TraitAligned => Box::new(TraitAlignedPolicy),
            Strategy::SeededRandom => Box::new(SeededRandomPolicy { seed }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How readily a persona confronts, coarsened from free-text descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comfort {
    Guarded,
    Measured,
    Assertive,
}

impl Comfort {
    fn of(persona: &Persona) -> Self {
        let comfort = persona
            .text(AttributeKey::ComfortWithConfrontation)
            .map(str::to_lowercase);
        let style = persona
            .text(AttributeKey::InterventionStyle)
            .map(str::to_lowercase)
            .unwrap_or_default();

        let base = match comfort.as_deref().map(str::trim) {
            Some(text) if text.starts_with("low") || text.starts_with("very low") => Self::Guarded,
            Some(text) if text.starts_with("moderate") => Self::Measured,
            Some(text) if text.contains("high") => Self::Assertive,
            _ => Self::Measured,
        };
        let direct_style = style.contains("direct") && !style.contains("indirect");
        if base == Self::Measured && direct_style {
            Self::Assertive
        } else {
            base
        }
    }

    /// Skill families in descending preference.
    const fn preferences(self) -> [&'static str; 5] {
        match self {
            Self::Assertive => [
                "direct_intervention",
                "warning_signs",
                "support_survivor",
                "know_resources",
                "distraction",
            ],
            Self::Measured => [
                "distraction",
                "support_survivor",
                "warning_signs",
                "know_resources",
                "direct_intervention",
            ],
            Self::Guarded => [
                "know_resources",
                "support_survivor",
                "distraction",
                "warning_signs",
                "direct_intervention",
            ],
        }
    }
}

struct TraitAlignedPolicy;

impl TraitAlignedPolicy {
    fn score(choice: &Choice, preferences: &[&str; 5]) -> u64 {
        choice
            .skills
            .iter()
            .map(|(skill, delta)| {
                let weight = preferences
                    .iter()
                    .position(|preferred| preferred == skill)
                    .map_or(1, |rank| (preferences.len() - rank) as u64 + 1);
                weight * u64::from(*delta)
            })
            .sum()
    }
}

impl DecisionPolicy for TraitAlignedPolicy {
    fn name(&self) -> &str {
        "Trait Aligned"
    }

    fn choose(&self, node: &Node, persona: &Persona) -> Result<String, PolicyError> {
        let preferences = Comfort::of(persona).preferences();
        let mut best: Option<(&Choice, u64)> = None;
        for choice in &node.options {
            let score = Self::score(choice, &preferences);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((choice, score));
            }
        }
        best.map(|(choice, _)| choice.id.clone())
            .ok_or(PolicyError::Rejected)
    }
}

struct SeededRandomPolicy {
    seed: u64,
}

impl DecisionPolicy for SeededRandomPolicy {
    fn name(&self) -> &str {
        "Seeded Random"
    }

    fn choose(&self, node: &Node, persona: &Persona) -> Result<String, PolicyError> {
        if node.options.is_empty() {
            return Err(PolicyError::Rejected);
        }
        let stream = format!("policy:{}", node.id);
        let mut rng = stream_rng(self.seed, &persona.id, &stream);
        let idx = rng.gen_range(0..node.options.len());
        Ok(node.options[idx].id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstander_engine::{AttributeValue, ScenarioGraph};

    const NODE: &str = r#"{
        "entries": ["party"],
        "nodes": [
            { "id": "party", "kind": "decision", "options": [
                { "id": "notice", "target": "end", "skills": { "warning_signs": 1 } },
                { "id": "confront", "target": "end", "skills": { "direct_intervention": 1 } },
                { "id": "spill", "target": "end", "skills": { "distraction": 1 } },
                { "id": "call", "target": "end", "skills": { "know_resources": 1 } }
            ] },
            { "id": "end", "kind": "reflection" }
        ]
    }"#;

    fn party() -> Node {
        ScenarioGraph::from_json(NODE)
            .unwrap()
            .get_node("party")
            .unwrap()
            .clone()
    }

    fn persona(comfort: &str, style: &str) -> Persona {
        Persona::new("p", "P")
            .with_attribute(
                AttributeKey::ComfortWithConfrontation,
                AttributeValue::Text(comfort.into()),
            )
            .with_attribute(
                AttributeKey::InterventionStyle,
                AttributeValue::Text(style.into()),
            )
    }

    #[test]
    fn trait_aligned_follows_comfort() {
        let policy = Strategy::TraitAligned.create_policy(0);
        let node = party();
        assert_eq!(policy.choose(&node, &persona("high", "direct")), Ok("confront".into()));
        assert_eq!(policy.choose(&node, &persona("high but careful", "")), Ok("confront".into()));
        assert_eq!(policy.choose(&node, &persona("moderate", "indirect and supportive")), Ok("spill".into()));
        assert_eq!(policy.choose(&node, &persona("moderate", "direct but friendly")), Ok("confront".into()));
        assert_eq!(policy.choose(&node, &persona("low", "")), Ok("call".into()));
        assert_eq!(policy.choose(&node, &persona("very low", "")), Ok("call".into()));
        assert_eq!(policy.choose(&node, &Persona::new("q", "Q")), Ok("spill".into()));
    }

    #[test]
    fn seeded_random_is_reproducible_per_persona() {
        let node = party();
        let a = Strategy::SeededRandom.create_policy(99);
        let b = Strategy::SeededRandom.create_policy(99);
        for idx in 0..16 {
            let who = Persona::new(format!("p{idx}"), "P");
            assert_eq!(a.choose(&node, &who), b.choose(&node, &who));
        }
        let picks: std::collections::BTreeSet<_> = (0..32)
            .map(|idx| a.choose(&node, &Persona::new(format!("p{idx}"), "P")).unwrap())
            .collect();
        assert!(picks.len() > 1);
    }

    #[test]
    fn labels_render() {
        assert_eq!(Strategy::FirstOption.to_string(), "First Option");
        assert_eq!(Strategy::FirstOption.create_policy(1).name(), "first-option");
    }
}
