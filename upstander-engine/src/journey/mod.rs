//! Journey records and the walker that produces them.
//!
//! A [`JourneyWalker`] drives one persona through the graph and is consumed
//! into a [`JourneyRecord`]. Records are final once produced; the only later
//! step is attaching survey [`Feedback`], which yields a new record value.
mod feedback;
mod store;
mod walker;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::SECONDS_PER_MINUTE;
use crate::ledger::SkillSnapshot;

pub use feedback::{Feedback, Rating};
pub use store::JourneyStore;
pub use walker::{FixedStepClock, JourneyWalker, NoClock, StepClock};

/// How a journey ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JourneyOutcome {
    Completed,
    InvalidChoice { node: String, returned: String },
    PolicyFailed { node: String, reason: String },
    PolicyTimedOut { node: String, after: Duration },
    StepBudgetExhausted { budget: usize },
}

impl JourneyOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InvalidChoice { .. } => "invalid_choice",
            Self::PolicyFailed { .. } => "policy_failed",
            Self::PolicyTimedOut { .. } => "policy_timed_out",
            Self::StepBudgetExhausted { .. } => "step_budget_exhausted",
        }
    }

    /// Node at which a truncated journey stopped.
    #[must_use]
    pub fn truncated_at(&self) -> Option<&str> {
        match self {
            Self::InvalidChoice { node, .. }
            | Self::PolicyFailed { node, .. }
            | Self::PolicyTimedOut { node, .. } => Some(node),
            Self::Completed | Self::StepBudgetExhausted { .. } => None,
        }
    }
}

impl fmt::Display for JourneyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::InvalidChoice { node, returned } => {
                write!(f, "invalid choice `{returned}` at `{node}`")
            }
            Self::PolicyFailed { node, reason } => write!(f, "policy failed at `{node}`: {reason}"),
            Self::PolicyTimedOut { node, after } => {
                write!(f, "policy timed out at `{node}` after {after:?}")
            }
            Self::StepBudgetExhausted { budget } => {
                write!(f, "step budget of {budget} exhausted")
            }
        }
    }
}

/// One persona's finalized traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyRecord {
    persona_id: String,
    entry: String,
    visited_node_ids: Vec<String>,
    chosen_option_ids: Vec<String>,
    final_skills: SkillSnapshot,
    outcome: JourneyOutcome,
    elapsed: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feedback: Option<Feedback>,
}

impl JourneyRecord {
    pub(crate) fn new(
        persona_id: String,
        entry: String,
        visited_node_ids: Vec<String>,
        chosen_option_ids: Vec<String>,
        final_skills: SkillSnapshot,
        outcome: JourneyOutcome,
        elapsed: Duration,
    ) -> Self {
        Self {
            persona_id,
            entry,
            visited_node_ids,
            chosen_option_ids,
            final_skills,
            outcome,
            elapsed,
            feedback: None,
        }
    }

    /// Attach survey feedback, replacing any earlier attachment.
    #[must_use]
    pub fn with_feedback(self, feedback: Feedback) -> Self {
        Self {
            feedback: Some(feedback),
            ..self
        }
    }

    #[must_use]
    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    #[must_use]
    pub fn visited_node_ids(&self) -> &[String] {
        &self.visited_node_ids
    }

    #[must_use]
    pub fn chosen_option_ids(&self) -> &[String] {
        &self.chosen_option_ids
    }

    /// `(node, option)` pairs in the order they were taken.
    pub fn decisions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.visited_node_ids
            .iter()
            .zip(&self.chosen_option_ids)
            .map(|(node, option)| (node.as_str(), option.as_str()))
    }

    #[must_use]
    pub const fn final_skills(&self) -> &SkillSnapshot {
        &self.final_skills
    }

    #[must_use]
    pub const fn outcome(&self) -> &JourneyOutcome {
        &self.outcome
    }

    #[must_use]
    pub const fn completed(&self) -> bool {
        self.outcome.is_completed()
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / SECONDS_PER_MINUTE
    }

    #[must_use]
    pub const fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }
}
