use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::graph::Node;
use crate::persona::Persona;

/// Why a policy could not produce a decision.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy declined to choose")]
    Rejected,
    #[error("policy failed: {0}")]
    Failed(String),
    #[error("policy timed out after {0:?}")]
    TimedOut(Duration),
}

/// Decision oracle consulted at every node that offers options.
///
/// Implementations are shared across concurrent journeys and must derive
/// their answer only from the node and persona they are handed.
pub trait DecisionPolicy: Send + Sync {
    /// Name used for logging and reports.
    fn name(&self) -> &str;

    /// Return the id of one of `node`'s options.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] when no decision can be made; the journey
    /// is truncated at `node`.
    fn choose(&self, node: &Node, persona: &Persona) -> Result<String, PolicyError>;
}

/// Always takes the first declared option.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOptionPolicy;

impl DecisionPolicy for FirstOptionPolicy {
    fn name(&self) -> &str {
        "first-option"
    }

    fn choose(&self, node: &Node, _persona: &Persona) -> Result<String, PolicyError> {
        node.options
            .first()
            .map(|choice| choice.id.clone())
            .ok_or(PolicyError::Rejected)
    }
}

/// Replays fixed answers keyed by node id; unscripted nodes fall back to the
/// first option.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPolicy {
    answers: HashMap<String, String>,
}

impl ScriptedPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn answer(mut self, node: impl Into<String>, option: impl Into<String>) -> Self {
        self.answers.insert(node.into(), option.into());
        self
    }
}

impl DecisionPolicy for ScriptedPolicy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn choose(&self, node: &Node, persona: &Persona) -> Result<String, PolicyError> {
        match self.answers.get(&node.id) {
            Some(option) => Ok(option.clone()),
            None => FirstOptionPolicy.choose(node, persona),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Choice, ChoiceList, NodeKind};

    fn node(options: &[&str]) -> Node {
        Node {
            id: "n".to_string(),
            kind: NodeKind::Decision,
            title: String::new(),
            terminal: false,
            options: options
                .iter()
                .map(|id| Choice {
                    id: (*id).to_string(),
                    label: String::new(),
                    target: "t".to_string(),
                    skills: Default::default(),
                })
                .collect::<ChoiceList>(),
        }
    }

    #[test]
    fn first_option_picks_declared_head() {
        let persona = Persona::new("p", "P");
        assert_eq!(FirstOptionPolicy.choose(&node(&["b", "a"]), &persona), Ok("b".into()));
        assert_eq!(
            FirstOptionPolicy.choose(&node(&[]), &persona),
            Err(PolicyError::Rejected)
        );
    }

    #[test]
    fn scripted_overrides_and_falls_back() {
        let persona = Persona::new("p", "P");
        let policy = ScriptedPolicy::new().answer("n", "zzz");
        assert_eq!(policy.choose(&node(&["a"]), &persona), Ok("zzz".into()));
        let policy = ScriptedPolicy::new().answer("other", "zzz");
        assert_eq!(policy.choose(&node(&["a"]), &persona), Ok("a".into()));
        assert_eq!(policy.name(), "scripted");
    }

    #[test]
    fn errors_render_cause() {
        assert_eq!(
            PolicyError::TimedOut(Duration::from_millis(50)).to_string(),
            "policy timed out after 50ms"
        );
        assert_eq!(
            PolicyError::Failed("boom".into()).to_string(),
            "policy failed: boom"
        );
    }
}
