//! Journey aggregation and success-criteria scoring.
//!
//! [`AggregationEngine::aggregate`] is a pure function of a [`JourneyStore`]
//! and a [`StudyConfig`]; it never fails. Metrics with an empty sample are
//! left out of the per-dimension maps and surface as `insufficient_data`
//! when a criterion asks for them.
mod criteria;
mod stats;
mod themes;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{RATING_PASS, TALLY_SAMPLES, TOP_CORRELATIONS};
use crate::journey::{JourneyRecord, JourneyStore};

pub use criteria::{
    ConfigError, Criterion, CriterionOutcome, CriterionStatus, FailureCause, MetricKey,
    StudyConfig, Threshold,
};
pub use stats::Summary;
pub use themes::{Excerpt, KeywordTally, TallySummary, ThemeConfig, ThemePattern};

/// Pearson correlation between two rated dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    pub samples: usize,
}

/// Everything computed for one study run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_journeys: usize,
    pub completed_journeys: usize,
    pub completion_rate: f64,
    pub outcome_counts: BTreeMap<String, usize>,
    /// Elapsed minutes over completed journeys.
    pub time_minutes: Option<Summary>,
    pub per_dimension_means: BTreeMap<String, f64>,
    pub per_dimension_pass_pct: BTreeMap<String, f64>,
    pub per_dimension_medians: BTreeMap<String, f64>,
    pub per_dimension_counts: BTreeMap<String, usize>,
    /// Final skill levels over completed journeys; a skill a journey never
    /// touched counts as zero.
    pub skill_stats: BTreeMap<String, Summary>,
    /// `node -> option -> times chosen`, over every journey.
    pub choice_distribution: BTreeMap<String, BTreeMap<String, usize>>,
    pub dimension_correlations: Vec<Correlation>,
    pub success_criteria_status: BTreeMap<String, CriterionOutcome>,
    pub theme_buckets: BTreeMap<String, Vec<Excerpt>>,
    #[serde(default)]
    pub keyword_tallies: BTreeMap<String, TallySummary>,
}

impl AggregateMetrics {
    /// Observed value for a metric, or `None` when its sample is empty.
    #[must_use]
    pub fn metric(&self, key: &MetricKey) -> Option<f64> {
        match key {
            MetricKey::CompletionRate => (self.total_journeys > 0).then_some(self.completion_rate),
            MetricKey::MeanTimeMinutes => self.time_minutes.map(|summary| summary.mean),
            MetricKey::DimensionMean(dim) => self.per_dimension_means.get(dim).copied(),
            MetricKey::DimensionPassPct(dim) => self.per_dimension_pass_pct.get(dim).copied(),
            MetricKey::SkillMean(skill) => {
                if self.completed_journeys == 0 {
                    None
                } else {
                    Some(self.skill_stats.get(skill).map_or(0.0, |s| s.mean))
                }
            }
        }
    }

    #[must_use]
    pub fn criteria_passed(&self) -> usize {
        self.success_criteria_status
            .values()
            .filter(|outcome| outcome.passed())
            .count()
    }

    #[must_use]
    pub fn all_criteria_passed(&self) -> bool {
        self.success_criteria_status.values().all(CriterionOutcome::passed)
    }
}

/// Stateless entry point for turning journeys into metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationEngine;

impl AggregationEngine {
    #[must_use]
    pub fn aggregate(store: &JourneyStore, config: &StudyConfig) -> AggregateMetrics {
        let mut builder = MetricsBuilder::default();
        for record in store {
            builder.ingest(record);
        }
        let metrics = builder.finish(store, config);
        log::info!(
            "aggregated {} journeys ({} completed), {}/{} criteria passed",
            metrics.total_journeys,
            metrics.completed_journeys,
            metrics.criteria_passed(),
            metrics.success_criteria_status.len()
        );
        metrics
    }
}

#[derive(Default)]
struct MetricsBuilder {
    total: usize,
    completed: usize,
    outcomes: BTreeMap<String, usize>,
    minutes: Vec<f64>,
    skills: Vec<BTreeMap<String, f64>>,
    choices: BTreeMap<String, BTreeMap<String, usize>>,
    ratings: BTreeMap<String, Vec<f64>>,
    rated_journeys: Vec<BTreeMap<String, f64>>,
}

impl MetricsBuilder {
    fn ingest(&mut self, record: &JourneyRecord) {
        self.total += 1;
        *self
            .outcomes
            .entry(record.outcome().label().to_string())
            .or_default() += 1;

        for (node, option) in record.decisions() {
            *self
                .choices
                .entry(node.to_string())
                .or_default()
                .entry(option.to_string())
                .or_default() += 1;
        }

        if record.completed() {
            self.completed += 1;
            self.minutes.push(record.elapsed_minutes());
            self.skills.push(
                record
                    .final_skills()
                    .iter()
                    .map(|(skill, value)| (skill.to_string(), f64::from(value)))
                    .collect(),
            );
        }

        if let Some(feedback) = record.feedback() {
            let rated: BTreeMap<String, f64> = feedback
                .ratings
                .iter()
                .map(|(dim, rating)| (dim.clone(), f64::from(rating.value())))
                .collect();
            for (dim, value) in &rated {
                self.ratings.entry(dim.clone()).or_default().push(*value);
            }
            self.rated_journeys.push(rated);
        }
    }

    fn finish(self, store: &JourneyStore, config: &StudyConfig) -> AggregateMetrics {
        let dimensions: Vec<String> = if config.dimensions.is_empty() {
            self.ratings.keys().cloned().collect()
        } else {
            for (dim, values) in &self.ratings {
                if !config.dimensions.contains(dim) {
                    log::warn!(
                        "dropping {} rating(s) for undeclared dimension `{dim}`",
                        values.len()
                    );
                }
            }
            config.dimensions.clone()
        };

        let mut means = BTreeMap::new();
        let mut pass_pct = BTreeMap::new();
        let mut medians = BTreeMap::new();
        let mut counts = BTreeMap::new();
        for dim in &dimensions {
            let values = self.ratings.get(dim).map_or(&[][..], Vec::as_slice);
            counts.insert(dim.clone(), values.len());
            if let Some(summary) = Summary::of(values) {
                let positive = values
                    .iter()
                    .filter(|v| **v >= f64::from(RATING_PASS))
                    .count();
                means.insert(dim.clone(), summary.mean);
                medians.insert(dim.clone(), summary.median);
                pass_pct.insert(dim.clone(), ratio(positive, values.len()));
            }
        }

        let skill_names: BTreeSet<&String> =
            self.skills.iter().flat_map(BTreeMap::keys).collect();
        let skill_stats = skill_names
            .into_iter()
            .filter_map(|skill| {
                let values: Vec<f64> = self
                    .skills
                    .iter()
                    .map(|levels| levels.get(skill).copied().unwrap_or(0.0))
                    .collect();
                Summary::of(&values).map(|summary| (skill.clone(), summary))
            })
            .collect();

        let mut metrics = AggregateMetrics {
            total_journeys: self.total,
            completed_journeys: self.completed,
            completion_rate: ratio(self.completed, self.total),
            outcome_counts: self.outcomes,
            time_minutes: Summary::of(&self.minutes),
            per_dimension_means: means,
            per_dimension_pass_pct: pass_pct,
            per_dimension_medians: medians,
            per_dimension_counts: counts,
            skill_stats,
            choice_distribution: self.choices,
            dimension_correlations: correlations(&dimensions, &self.rated_journeys),
            success_criteria_status: BTreeMap::new(),
            theme_buckets: config.themes.bucket(store),
            keyword_tallies: config
                .tallies
                .iter()
                .map(|(name, tally)| (name.clone(), tally.tally(store, TALLY_SAMPLES)))
                .collect(),
        };

        let status = config
            .criteria
            .iter()
            .map(|(name, criterion)| {
                let observed = metrics.metric(&criterion.metric);
                (name.clone(), CriterionOutcome::evaluate(criterion, observed))
            })
            .collect();
        metrics.success_criteria_status = status;
        metrics
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn correlations(dimensions: &[String], journeys: &[BTreeMap<String, f64>]) -> Vec<Correlation> {
    let mut found = Vec::new();
    for (idx, first) in dimensions.iter().enumerate() {
        for second in &dimensions[idx + 1..] {
            let pairs: Vec<(f64, f64)> = journeys
                .iter()
                .filter_map(|rated| Some((*rated.get(first)?, *rated.get(second)?)))
                .collect();
            if let Some(coefficient) = stats::pearson(&pairs) {
                found.push(Correlation {
                    first: first.clone(),
                    second: second.clone(),
                    coefficient,
                    samples: pairs.len(),
                });
            }
        }
    }
    found.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    found.truncate(TOP_CORRELATIONS);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ScenarioGraph;
    use crate::journey::{Feedback, FixedStepClock, Rating};
    use crate::persona::Persona;
    use crate::policy::ScriptedPolicy;
    use crate::traversal::TraversalEngine;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> TraversalEngine {
        let graph = ScenarioGraph::from_json(
            r#"{
                "entries": ["start"],
                "nodes": [
                    { "id": "start", "kind": "decision", "options": [
                        { "id": "help", "target": "end", "skills": { "direct_intervention": 2 } },
                        { "id": "wait", "target": "end", "skills": { "warning_signs": 1 } }
                    ] },
                    { "id": "end", "kind": "reflection" }
                ]
            }"#,
        )
        .unwrap();
        TraversalEngine::new(Arc::new(graph))
    }

    fn journey(id: &str, option: &str, minutes: u64) -> JourneyRecord {
        engine()
            .traverse_with_clock(
                "start",
                &ScriptedPolicy::new().answer("start", option),
                &Persona::new(id, id),
                Box::new(FixedStepClock(Duration::from_secs(minutes * 60))),
            )
            .unwrap()
    }

    fn rated(record: JourneyRecord, ratings: &[(&str, u8)]) -> JourneyRecord {
        let feedback = ratings.iter().fold(Feedback::default(), |fb, (dim, value)| {
            fb.with_rating(*dim, Rating::new(*value).unwrap())
        });
        record.with_feedback(feedback)
    }

    #[test]
    fn counts_choices_across_all_journeys() {
        let store: JourneyStore = [
            journey("a", "help", 20),
            journey("b", "help", 25),
            journey("c", "wait", 30),
            journey("d", "bogus", 30),
        ]
        .into_iter()
        .collect();
        let metrics = AggregationEngine::aggregate(&store, &StudyConfig::default());
        assert_eq!(metrics.choice_distribution["start"]["help"], 2);
        assert_eq!(metrics.choice_distribution["start"]["wait"], 1);
        assert_eq!(metrics.outcome_counts["invalid_choice"], 1);
        assert!((metrics.completion_rate - 0.75).abs() < 1e-12);
        let time = metrics.time_minutes.unwrap();
        assert!((time.mean - 25.0).abs() < 1e-9);
        assert!((time.min - 20.0).abs() < 1e-9);
    }

    #[test]
    fn skill_stats_treat_untouched_skills_as_zero() {
        let store: JourneyStore = [journey("a", "help", 1), journey("b", "wait", 1)]
            .into_iter()
            .collect();
        let metrics = AggregationEngine::aggregate(&store, &StudyConfig::default());
        let direct = metrics.skill_stats["direct_intervention"];
        assert!((direct.mean - 1.0).abs() < 1e-12);
        assert!((direct.min).abs() < 1e-12);
        assert!((direct.max - 2.0).abs() < 1e-12);
        assert_eq!(
            metrics.metric(&MetricKey::SkillMean("know_resources".into())),
            Some(0.0)
        );
    }

    #[test]
    fn missing_ratings_are_excluded_from_denominators() {
        let store: JourneyStore = [
            rated(journey("a", "help", 1), &[("felt_safe", 5), ("realistic", 3)]),
            rated(journey("b", "help", 1), &[("felt_safe", 3)]),
            journey("c", "help", 1),
        ]
        .into_iter()
        .collect();
        let metrics = AggregationEngine::aggregate(&store, &StudyConfig::default());
        assert!((metrics.per_dimension_means["felt_safe"] - 4.0).abs() < 1e-12);
        assert!((metrics.per_dimension_pass_pct["felt_safe"] - 0.5).abs() < 1e-12);
        assert_eq!(metrics.per_dimension_counts["realistic"], 1);
        assert!((metrics.per_dimension_medians["realistic"] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn declared_dimension_without_ratings_has_no_mean() {
        let config = StudyConfig {
            dimensions: vec!["confidence".into()],
            ..StudyConfig::default()
        };
        let store: JourneyStore = [journey("a", "help", 1)].into_iter().collect();
        let metrics = AggregationEngine::aggregate(&store, &config);
        assert_eq!(metrics.per_dimension_counts["confidence"], 0);
        assert!(!metrics.per_dimension_means.contains_key("confidence"));
        assert_eq!(
            metrics.metric(&MetricKey::DimensionMean("confidence".into())),
            None
        );
    }

    #[test]
    fn correlations_rank_by_strength() {
        let store: JourneyStore = [
            rated(journey("a", "help", 1), &[("x", 1), ("y", 1), ("z", 3)]),
            rated(journey("b", "help", 1), &[("x", 3), ("y", 3), ("z", 4)]),
            rated(journey("c", "help", 1), &[("x", 5), ("y", 5), ("z", 3)]),
        ]
        .into_iter()
        .collect();
        let metrics = AggregationEngine::aggregate(&store, &StudyConfig::default());
        let top = &metrics.dimension_correlations[0];
        assert_eq!((top.first.as_str(), top.second.as_str()), ("x", "y"));
        assert!((top.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(top.samples, 3);
        assert!(metrics.dimension_correlations.len() <= TOP_CORRELATIONS);
    }
}
