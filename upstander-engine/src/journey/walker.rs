use std::time::Duration;

use super::{JourneyOutcome, JourneyRecord};
use crate::graph::{Choice, Node, ScenarioGraph};
use crate::ledger::SkillLedger;
use crate::policy::PolicyError;
use crate::traversal::TraversalError;

/// Source of simulated time for a journey.
///
/// Ticked once per transition with the node being left and the option taken.
pub trait StepClock: Send {
    fn tick(&mut self, node: &Node, choice: &Choice) -> Duration;
}

/// Clock that never advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl StepClock for NoClock {
    fn tick(&mut self, _node: &Node, _choice: &Choice) -> Duration {
        Duration::ZERO
    }
}

/// Clock that advances by the same amount on every transition.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepClock(pub Duration);

impl StepClock for FixedStepClock {
    fn tick(&mut self, _node: &Node, _choice: &Choice) -> Duration {
        self.0
    }
}

/// Step-by-step traversal state for one persona.
///
/// The caller asks for the pending [`decision_point`](Self::decision_point),
/// obtains an answer however it likes, and feeds it back through
/// [`resolve`](Self::resolve). Once no decision is pending the walker is
/// consumed by [`finish`](Self::finish).
pub struct JourneyWalker<'g> {
    graph: &'g ScenarioGraph,
    persona_id: String,
    entry: String,
    current: &'g Node,
    visited: Vec<String>,
    chosen: Vec<String>,
    ledger: SkillLedger,
    clock: Box<dyn StepClock + 'g>,
    elapsed: Duration,
    budget: usize,
    outcome: Option<JourneyOutcome>,
}

impl<'g> JourneyWalker<'g> {
    /// Enter `entry` and record it as the first visited node.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Graph`] if `entry` is not in the graph.
    pub fn new(
        graph: &'g ScenarioGraph,
        entry: &str,
        persona_id: impl Into<String>,
        budget: usize,
        clock: Box<dyn StepClock + 'g>,
    ) -> Result<Self, TraversalError> {
        let current = graph.get_node(entry)?;
        let mut walker = Self {
            graph,
            persona_id: persona_id.into(),
            entry: entry.to_string(),
            current,
            visited: vec![current.id.clone()],
            chosen: Vec::new(),
            ledger: SkillLedger::new(),
            clock,
            elapsed: Duration::ZERO,
            budget,
            outcome: None,
        };
        walker.settle();
        Ok(walker)
    }

    /// Node awaiting a decision, or `None` once the journey has ended.
    #[must_use]
    pub fn decision_point(&self) -> Option<&'g Node> {
        match self.outcome {
            Some(_) => None,
            None => Some(self.current),
        }
    }

    #[must_use]
    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    #[must_use]
    pub fn steps(&self) -> usize {
        self.chosen.len()
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub const fn ledger(&self) -> &SkillLedger {
        &self.ledger
    }

    /// Apply the policy's answer for the pending node.
    ///
    /// Policy errors and unknown option ids end the journey; they are not
    /// returned as errors.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Finished`] when nothing is pending and
    /// [`TraversalError::Graph`] if an option target cannot be resolved.
    pub fn resolve(&mut self, decision: Result<String, PolicyError>) -> Result<(), TraversalError> {
        let node = self.decision_point().ok_or(TraversalError::Finished)?;

        let option_id = match decision {
            Ok(option_id) => option_id,
            Err(PolicyError::TimedOut(after)) => {
                self.truncate(JourneyOutcome::PolicyTimedOut {
                    node: node.id.clone(),
                    after,
                });
                return Ok(());
            }
            Err(err) => {
                self.truncate(JourneyOutcome::PolicyFailed {
                    node: node.id.clone(),
                    reason: err.to_string(),
                });
                return Ok(());
            }
        };

        let Some(choice) = node.option(&option_id) else {
            self.truncate(JourneyOutcome::InvalidChoice {
                node: node.id.clone(),
                returned: option_id,
            });
            return Ok(());
        };

        let target = self.graph.get_node(&choice.target)?;

        self.chosen.push(choice.id.clone());
        self.ledger.apply(&choice.skills);
        self.elapsed += self.clock.tick(node, choice);
        log::debug!(
            "{}: {} --{}--> {}",
            self.persona_id,
            node.id,
            choice.id,
            target.id
        );
        self.visited.push(target.id.clone());
        self.current = target;
        self.settle();
        Ok(())
    }

    /// Freeze the walk into a record.
    ///
    /// A walker finished while a decision is still pending records the
    /// journey as abandoned at that node.
    #[must_use]
    pub fn finish(self) -> JourneyRecord {
        let outcome = self.outcome.unwrap_or_else(|| JourneyOutcome::PolicyFailed {
            node: self.current.id.clone(),
            reason: "abandoned before a decision was made".to_string(),
        });
        JourneyRecord::new(
            self.persona_id,
            self.entry,
            self.visited,
            self.chosen,
            self.ledger.snapshot(),
            outcome,
            self.elapsed,
        )
    }

    fn settle(&mut self) {
        if self.current.is_end() {
            self.outcome = Some(JourneyOutcome::Completed);
        } else if self.steps() >= self.budget {
            self.truncate(JourneyOutcome::StepBudgetExhausted {
                budget: self.budget,
            });
        }
    }

    fn truncate(&mut self, outcome: JourneyOutcome) {
        log::warn!("journey for {} truncated: {outcome}", self.persona_id);
        self.outcome = Some(outcome);
    }
}
