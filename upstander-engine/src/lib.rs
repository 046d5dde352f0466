//! Upstander Study Engine
//!
//! Platform-agnostic core for bystander-intervention training studies:
//! scenario graph validation, persona traversal with skill accrual, and
//! aggregation of finished journeys into success-criteria verdicts.
//! This crate does no I/O of its own; inputs arrive through [`StudyLoader`].

pub mod aggregate;
pub mod constants;
pub mod graph;
pub mod journey;
pub mod ledger;
pub mod persona;
pub mod policy;
pub mod traversal;

use std::sync::Arc;
use thiserror::Error;

pub use aggregate::{
    AggregateMetrics, AggregationEngine, ConfigError, Correlation, Criterion, CriterionOutcome,
    CriterionStatus, Excerpt, FailureCause, KeywordTally, MetricKey, StudyConfig, Summary,
    TallySummary, ThemeConfig, ThemePattern, Threshold,
};
pub use graph::{
    Choice, ChoiceDescription, ChoiceList, GraphError, Node, NodeDescription, NodeKind,
    ScenarioDescription, ScenarioGraph, SkillDeltas,
};
pub use journey::{
    Feedback, FixedStepClock, JourneyOutcome, JourneyRecord, JourneyStore, JourneyWalker, NoClock,
    Rating, StepClock,
};
pub use ledger::{SkillLedger, SkillSnapshot};
pub use persona::{AttributeKey, AttributeValue, Persona, PersonaRoster};
pub use policy::{DecisionPolicy, FirstOptionPolicy, PolicyError, ScriptedPolicy};
pub use traversal::{TraversalConfig, TraversalEngine, TraversalError};

/// Source of study inputs.
/// Runners provide the file-system or embedded implementation.
pub trait StudyLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the raw scenario document.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario cannot be read or parsed.
    fn load_scenario(&self) -> Result<ScenarioDescription, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the roster cannot be read or parsed.
    fn load_personas(&self) -> Result<PersonaRoster, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the study configuration cannot be read or parsed.
    fn load_study(&self) -> Result<StudyConfig, Self::Error>;
}

/// Failures while assembling a [`Study`].
#[derive(Debug, Error)]
pub enum StudyError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("failed to load study inputs")]
    Load(#[source] E),
    #[error("scenario graph is invalid")]
    Graph(#[from] GraphError),
    #[error("study configuration is invalid")]
    Config(#[from] ConfigError),
}

/// Validated inputs ready to run.
#[derive(Debug, Clone)]
pub struct Study {
    pub engine: TraversalEngine,
    pub roster: PersonaRoster,
    pub config: StudyConfig,
}

impl Study {
    /// Walk every persona in roster order on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`TraversalError`].
    pub fn run_sequential(&self, policy: &dyn DecisionPolicy) -> Result<JourneyStore, TraversalError> {
        self.roster
            .iter()
            .map(|persona| self.engine.traverse(policy, persona))
            .collect()
    }

    #[must_use]
    pub fn aggregate(&self, store: &JourneyStore) -> AggregateMetrics {
        AggregationEngine::aggregate(store, &self.config)
    }
}

/// Assembles studies from a loader.
pub struct StudyEngine<L>
where
    L: StudyLoader,
{
    loader: L,
    traversal: TraversalConfig,
}

impl<L> StudyEngine<L>
where
    L: StudyLoader,
{
    pub fn new(loader: L) -> Self {
        Self::with_traversal(loader, TraversalConfig::default())
    }

    pub const fn with_traversal(loader: L, traversal: TraversalConfig) -> Self {
        Self { loader, traversal }
    }

    /// Load and validate every input.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError`] if loading fails, the graph is invalid or the
    /// study configuration is inconsistent.
    pub fn prepare(&self) -> Result<Study, StudyError<L::Error>> {
        let graph = ScenarioGraph::load(self.loader.load_scenario().map_err(StudyError::Load)?)?;
        let roster = self.loader.load_personas().map_err(StudyError::Load)?;
        let config = self.loader.load_study().map_err(StudyError::Load)?;
        config.validate()?;
        log::info!(
            "prepared study `{}`: {} personas, {} criteria",
            graph.title(),
            roster.len(),
            config.criteria.len()
        );
        Ok(Study {
            engine: TraversalEngine::with_config(Arc::new(graph), self.traversal),
            roster,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone, Default)]
    struct FixtureLoader {
        broken_target: bool,
    }

    impl StudyLoader for FixtureLoader {
        type Error = Infallible;

        fn load_scenario(&self) -> Result<ScenarioDescription, Self::Error> {
            let target = if self.broken_target { "gone" } else { "end" };
            let json = format!(
                r#"{{
                    "title": "Fixture",
                    "entries": ["start"],
                    "nodes": [
                        {{ "id": "start", "kind": "decision", "options": [{{ "id": "go", "target": "{target}", "skills": {{ "warning_signs": 1 }} }}] }},
                        {{ "id": "end", "kind": "reflection" }}
                    ]
                }}"#
            );
            Ok(ScenarioDescription::from_json(&json).unwrap())
        }

        fn load_personas(&self) -> Result<PersonaRoster, Self::Error> {
            Ok(PersonaRoster(vec![Persona::new("a", "A"), Persona::new("b", "B")]))
        }

        fn load_study(&self) -> Result<StudyConfig, Self::Error> {
            Ok(StudyConfig::from_json(
                r#"{ "criteria": { "done": { "metric": "completion_rate", "threshold": { "op": ">=", "value": 0.7 } } } }"#,
            )
            .unwrap())
        }
    }

    #[test]
    fn prepared_study_runs_and_scores() {
        let study = StudyEngine::new(FixtureLoader::default()).prepare().unwrap();
        let store = study.run_sequential(&FirstOptionPolicy).unwrap();
        assert_eq!(store.len(), 2);
        let metrics = study.aggregate(&store);
        assert!((metrics.completion_rate - 1.0).abs() < f64::EPSILON);
        assert!(metrics.success_criteria_status["done"].passed());
    }

    #[test]
    fn panicking_policy_does_not_abort_the_population() {
        struct PanicsForA;

        impl DecisionPolicy for PanicsForA {
            fn name(&self) -> &str {
                "panics-for-a"
            }

            fn choose(&self, node: &Node, persona: &Persona) -> Result<String, PolicyError> {
                assert_ne!(persona.id, "a", "policy gave up");
                FirstOptionPolicy.choose(node, persona)
            }
        }

        let study = StudyEngine::new(FixtureLoader::default()).prepare().unwrap();
        let store = study.run_sequential(&PanicsForA).unwrap();
        assert_eq!(store.len(), 2);
        let outcomes: Vec<_> = store.iter().map(|r| r.outcome().label()).collect();
        assert_eq!(outcomes, ["policy_failed", "completed"]);
    }

    #[test]
    fn invalid_graph_is_reported() {
        let engine = StudyEngine::new(FixtureLoader {
            broken_target: true,
        });
        assert!(matches!(
            engine.prepare(),
            Err(StudyError::Graph(GraphError::DanglingTarget { .. }))
        ));
    }

    #[test]
    fn traversal_budget_flows_into_engine() {
        let engine = StudyEngine::with_traversal(
            FixtureLoader::default(),
            TraversalConfig { max_steps: Some(0) },
        );
        let study = engine.prepare().unwrap();
        let store = study.run_sequential(&FirstOptionPolicy).unwrap();
        assert_eq!(store.completed().count(), 0);
    }
}
