use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::graph::{GraphError, Node, ScenarioGraph};
use crate::journey::{JourneyRecord, JourneyWalker, NoClock, StepClock};
use crate::persona::Persona;
use crate::policy::{DecisionPolicy, PolicyError};

/// Traversal failures that abort the walk rather than truncate the journey.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraversalError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("journey has already finished")]
    Finished,
}

/// Traversal tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraversalConfig {
    /// Maximum transitions per journey; defaults to the graph's node count.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

/// Walks personas through a shared scenario graph.
#[derive(Debug, Clone)]
pub struct TraversalEngine {
    graph: Arc<ScenarioGraph>,
    config: TraversalConfig,
}

impl TraversalEngine {
    #[must_use]
    pub fn new(graph: Arc<ScenarioGraph>) -> Self {
        Self::with_config(graph, TraversalConfig::default())
    }

    #[must_use]
    pub const fn with_config(graph: Arc<ScenarioGraph>, config: TraversalConfig) -> Self {
        Self { graph, config }
    }

    #[must_use]
    pub fn graph(&self) -> &Arc<ScenarioGraph> {
        &self.graph
    }

    #[must_use]
    pub fn step_budget(&self) -> usize {
        self.config.max_steps.unwrap_or_else(|| self.graph.len())
    }

    /// Walk `persona` from the default entry with no simulated time.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError`] if the graph cannot resolve a node.
    pub fn traverse(
        &self,
        policy: &dyn DecisionPolicy,
        persona: &Persona,
    ) -> Result<JourneyRecord, TraversalError> {
        self.traverse_with_clock(self.graph.entry(), policy, persona, Box::new(NoClock))
    }

    /// Walk `persona` from a named entry.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError`] if `entry` or any target is missing.
    pub fn traverse_from(
        &self,
        entry: &str,
        policy: &dyn DecisionPolicy,
        persona: &Persona,
    ) -> Result<JourneyRecord, TraversalError> {
        self.traverse_with_clock(entry, policy, persona, Box::new(NoClock))
    }

    /// Walk `persona`, advancing `clock` on each transition.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError`] if `entry` or any target is missing.
    pub fn traverse_with_clock(
        &self,
        entry: &str,
        policy: &dyn DecisionPolicy,
        persona: &Persona,
        clock: Box<dyn StepClock + '_>,
    ) -> Result<JourneyRecord, TraversalError> {
        let mut walker = self.begin(entry, &persona.id, clock)?;
        while let Some(node) = walker.decision_point() {
            walker.resolve(guarded_choose(policy, node, persona))?;
        }
        let record = walker.finish();
        log::debug!(
            "{} finished via {}: {} after {} step(s)",
            persona.id,
            policy.name(),
            record.outcome(),
            record.chosen_option_ids().len()
        );
        Ok(record)
    }

    /// Start a step-by-step walk. Used by callers that need control over
    /// each policy call.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError`] if `entry` is missing.
    pub fn begin<'a>(
        &'a self,
        entry: &str,
        persona_id: &str,
        clock: Box<dyn StepClock + 'a>,
    ) -> Result<JourneyWalker<'a>, TraversalError> {
        JourneyWalker::new(&self.graph, entry, persona_id, self.step_budget(), clock)
    }
}

/// A panicking policy fails its own journey, never the caller.
fn guarded_choose(
    policy: &dyn DecisionPolicy,
    node: &Node,
    persona: &Persona,
) -> Result<String, PolicyError> {
    panic::catch_unwind(AssertUnwindSafe(|| policy.choose(node, persona))).unwrap_or_else(
        |payload| {
            Err(PolicyError::Failed(format!(
                "policy panicked: {}",
                panic_message(payload.as_ref())
            )))
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::JourneyOutcome;
    use crate::policy::{FirstOptionPolicy, ScriptedPolicy};

    fn engine(max_steps: Option<usize>) -> TraversalEngine {
        let graph = ScenarioGraph::from_json(
            r#"{
                "entries": ["one", "two"],
                "nodes": [
                    { "id": "one", "kind": "setup", "options": [{ "id": "go", "target": "two", "skills": { "warning_signs": 1 } }] },
                    { "id": "two", "kind": "decision", "options": [
                        { "id": "left", "target": "end", "skills": { "support_survivor": 1 } },
                        { "id": "right", "target": "end", "skills": { "know_resources": 1 } }
                    ] },
                    { "id": "end", "kind": "reflection" }
                ]
            }"#,
        )
        .unwrap();
        TraversalEngine::with_config(Arc::new(graph), TraversalConfig { max_steps })
    }

    #[test]
    fn default_budget_is_node_count() {
        assert_eq!(engine(None).step_budget(), 3);
        assert_eq!(engine(Some(1)).step_budget(), 1);
    }

    #[test]
    fn traverse_uses_default_entry() {
        let record = engine(None)
            .traverse(&FirstOptionPolicy, &Persona::new("p", "P"))
            .unwrap();
        assert!(record.completed());
        assert_eq!(record.entry(), "one");
        assert_eq!(record.final_skills().get("warning_signs"), 1);
        assert_eq!(record.final_skills().get("support_survivor"), 1);
    }

    #[test]
    fn traverse_from_secondary_entry() {
        let policy = ScriptedPolicy::new().answer("two", "right");
        let record = engine(None)
            .traverse_from("two", &policy, &Persona::new("p", "P"))
            .unwrap();
        assert_eq!(record.visited_node_ids(), ["two", "end"]);
        assert_eq!(record.final_skills().get("know_resources"), 1);
        assert_eq!(record.final_skills().get("warning_signs"), 0);
    }

    #[test]
    fn invalid_choice_truncates_without_error() {
        let policy = ScriptedPolicy::new().answer("two", "sideways");
        let record = engine(None)
            .traverse(&policy, &Persona::new("p", "P"))
            .unwrap();
        assert_eq!(
            record.outcome(),
            &JourneyOutcome::InvalidChoice {
                node: "two".into(),
                returned: "sideways".into()
            }
        );
        assert_eq!(record.visited_node_ids(), ["one", "two"]);
    }

    #[test]
    fn missing_entry_is_fatal() {
        let err = engine(None)
            .traverse_from("zero", &FirstOptionPolicy, &Persona::new("p", "P"))
            .unwrap_err();
        assert_eq!(
            err,
            TraversalError::Graph(GraphError::NodeNotFound {
                node: "zero".into()
            })
        );
    }
}
