use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::themes::{KeywordTally, ThemeConfig};

/// Errors raised by malformed study configuration or rating values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("study configuration could not be parsed: {0}")]
    Parse(String),
    #[error("rating {value} is outside the 1-5 scale")]
    RatingOutOfRange { value: u8 },
    #[error("unknown threshold operator `{op}`")]
    UnknownOperator { op: String },
    #[error("threshold `{op}` requires `{bound}`")]
    MissingBound { op: String, bound: &'static str },
    #[error("threshold `{op}` does not accept `{bound}`")]
    UnexpectedBound { op: String, bound: &'static str },
    #[error("threshold bound {value} is not a finite number")]
    NonFiniteBound { value: f64 },
    #[error("between range is inverted: {low} > {high}")]
    InvertedRange { low: f64, high: f64 },
    #[error("criterion `{criterion}` references undeclared dimension `{dimension}`")]
    UnknownDimension { criterion: String, dimension: String },
    #[error("theme #{index} has an empty label")]
    EmptyThemeLabel { index: usize },
    #[error("theme `{label}` has an empty keyword")]
    EmptyThemeKeyword { label: String },
    #[error("keyword tally `{tally}` names no response field")]
    EmptyTallyField { tally: String },
}

/// Aggregate value a criterion is tested against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    CompletionRate,
    MeanTimeMinutes,
    DimensionMean(String),
    DimensionPassPct(String),
    SkillMean(String),
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompletionRate => f.write_str("completion rate"),
            Self::MeanTimeMinutes => f.write_str("mean time (minutes)"),
            Self::DimensionMean(dim) => write!(f, "{dim} mean"),
            Self::DimensionPassPct(dim) => write!(f, "{dim} rated 4-5"),
            Self::SkillMean(skill) => write!(f, "{skill} mean"),
        }
    }
}

/// Inclusive comparison applied to an observed metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThreshold", into = "RawThreshold")]
pub enum Threshold {
    AtLeast(f64),
    AtMost(f64),
    Between { low: f64, high: f64 },
}

impl Threshold {
    /// # Errors
    ///
    /// Returns [`ConfigError`] for non-finite or inverted bounds.
    pub fn between(low: f64, high: f64) -> Result<Self, ConfigError> {
        finite(low)?;
        finite(high)?;
        if low > high {
            return Err(ConfigError::InvertedRange { low, high });
        }
        Ok(Self::Between { low, high })
    }

    #[must_use]
    pub fn holds(self, observed: f64) -> bool {
        match self {
            Self::AtLeast(min) => observed >= min,
            Self::AtMost(max) => observed <= max,
            Self::Between { low, high } => (low..=high).contains(&observed),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(min) => write!(f, ">= {min}"),
            Self::AtMost(max) => write!(f, "<= {max}"),
            Self::Between { low, high } => write!(f, "between {low} and {high}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThreshold {
    op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    high: Option<f64>,
}

impl TryFrom<RawThreshold> for Threshold {
    type Error = ConfigError;

    fn try_from(raw: RawThreshold) -> Result<Self, Self::Error> {
        let require = |bound: Option<f64>, name: &'static str| {
            bound.ok_or_else(|| ConfigError::MissingBound {
                op: raw.op.clone(),
                bound: name,
            })
        };
        let reject = |bound: Option<f64>, name: &'static str| match bound {
            Some(_) => Err(ConfigError::UnexpectedBound {
                op: raw.op.clone(),
                bound: name,
            }),
            None => Ok(()),
        };

        match raw.op.as_str() {
            ">=" | "<=" => {
                reject(raw.low, "low")?;
                reject(raw.high, "high")?;
                let value = finite(require(raw.value, "value")?)?;
                if raw.op == ">=" {
                    Ok(Self::AtLeast(value))
                } else {
                    Ok(Self::AtMost(value))
                }
            }
            "between" => {
                reject(raw.value, "value")?;
                Self::between(require(raw.low, "low")?, require(raw.high, "high")?)
            }
            _ => Err(ConfigError::UnknownOperator { op: raw.op.clone() }),
        }
    }
}

impl From<Threshold> for RawThreshold {
    fn from(threshold: Threshold) -> Self {
        let (op, value, low, high) = match threshold {
            Threshold::AtLeast(v) => (">=", Some(v), None, None),
            Threshold::AtMost(v) => ("<=", Some(v), None, None),
            Threshold::Between { low, high } => ("between", None, Some(low), Some(high)),
        };
        Self {
            op: op.to_string(),
            value,
            low,
            high,
        }
    }
}

fn finite(value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFiniteBound { value })
    }
}

/// Named threshold test on one aggregate metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    pub metric: MetricKey,
    pub threshold: Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    ThresholdMissed,
    InsufficientData,
}

/// Evaluated criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionOutcome {
    pub metric: MetricKey,
    pub threshold: Threshold,
    pub status: CriterionStatus,
    pub observed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCause>,
}

impl CriterionOutcome {
    #[must_use]
    pub fn evaluate(criterion: &Criterion, observed: Option<f64>) -> Self {
        let (status, failure) = match observed {
            None => (CriterionStatus::Fail, Some(FailureCause::InsufficientData)),
            Some(value) if criterion.threshold.holds(value) => (CriterionStatus::Pass, None),
            Some(_) => (CriterionStatus::Fail, Some(FailureCause::ThresholdMissed)),
        };
        Self {
            metric: criterion.metric.clone(),
            threshold: criterion.threshold,
            status,
            observed,
            failure,
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == CriterionStatus::Pass
    }
}

/// Study-level aggregation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    /// Rated dimensions to report; empty means every dimension seen in
    /// feedback. When set, ratings for other dimensions are dropped with a
    /// warning.
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub criteria: BTreeMap<String, Criterion>,
    #[serde(default)]
    pub themes: ThemeConfig,
    /// Named multi-label keyword counts, e.g. sentiment over one field.
    #[serde(default)]
    pub tallies: BTreeMap<String, KeywordTally>,
}

impl StudyConfig {
    /// Parse and validate a study configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed JSON, bad thresholds or
    /// inconsistent references.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] when a criterion names an undeclared dimension
    /// or a theme is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dimensions.is_empty() {
            for (name, criterion) in &self.criteria {
                let dimension = match &criterion.metric {
                    MetricKey::DimensionMean(dim) | MetricKey::DimensionPassPct(dim) => dim,
                    _ => continue,
                };
                if !self.dimensions.contains(dimension) {
                    return Err(ConfigError::UnknownDimension {
                        criterion: name.clone(),
                        dimension: dimension.clone(),
                    });
                }
            }
        }
        for (name, tally) in &self.tallies {
            tally.validate(name)?;
        }
        self.themes.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(json: &str) -> Result<Threshold, String> {
        serde_json::from_str::<Threshold>(json).map_err(|err| err.to_string())
    }

    #[test]
    fn parses_each_operator() {
        assert_eq!(threshold(r#"{"op":">=","value":0.7}"#), Ok(Threshold::AtLeast(0.7)));
        assert_eq!(threshold(r#"{"op":"<=","value":30}"#), Ok(Threshold::AtMost(30.0)));
        assert_eq!(
            threshold(r#"{"op":"between","low":20,"high":30}"#),
            Ok(Threshold::Between {
                low: 20.0,
                high: 30.0
            })
        );
    }

    #[test]
    fn rejects_malformed_thresholds() {
        assert!(threshold(r#"{"op":">","value":1}"#).unwrap_err().contains("unknown threshold operator"));
        assert!(threshold(r#"{"op":">="}"#).unwrap_err().contains("requires `value`"));
        assert!(threshold(r#"{"op":"between","low":5,"high":1}"#).unwrap_err().contains("inverted"));
        assert!(threshold(r#"{"op":"between","low":1,"high":2,"value":3}"#).is_err());
        assert!(threshold(r#"{"op":">=","value":1,"margin":2}"#).is_err());
    }

    #[test]
    fn between_is_inclusive() {
        let t = Threshold::between(20.0, 30.0).unwrap();
        assert!(t.holds(20.0));
        assert!(t.holds(30.0));
        assert!(!t.holds(30.01));
        assert_eq!(t.to_string(), "between 20 and 30");
    }

    #[test]
    fn outcome_records_failure_cause() {
        let criterion = Criterion {
            metric: MetricKey::CompletionRate,
            threshold: Threshold::AtLeast(0.7),
        };
        assert!(CriterionOutcome::evaluate(&criterion, Some(0.7)).passed());
        assert_eq!(
            CriterionOutcome::evaluate(&criterion, Some(0.5)).failure,
            Some(FailureCause::ThresholdMissed)
        );
        assert_eq!(
            CriterionOutcome::evaluate(&criterion, None).failure,
            Some(FailureCause::InsufficientData)
        );
    }

    #[test]
    fn study_config_checks_dimension_references() {
        let json = r#"{
            "dimensions": ["felt_safe"],
            "criteria": {
                "safety": { "metric": { "dimension_mean": "realistic" }, "threshold": { "op": ">=", "value": 4 } }
            }
        }"#;
        assert_eq!(
            StudyConfig::from_json(json),
            Err(ConfigError::UnknownDimension {
                criterion: "safety".into(),
                dimension: "realistic".into()
            })
        );
    }

    #[test]
    fn study_config_rejects_unknown_keys() {
        assert!(matches!(
            StudyConfig::from_json(r#"{ "criteria": {}, "weights": {} }"#),
            Err(ConfigError::Parse(_))
        ));
        let config = StudyConfig::from_json(r#"{ "criteria": { "done": { "metric": "completion_rate", "threshold": { "op": ">=", "value": 0.7 } } } }"#).unwrap();
        assert_eq!(config.criteria["done"].metric, MetricKey::CompletionRate);
    }
}
