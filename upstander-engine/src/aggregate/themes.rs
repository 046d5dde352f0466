use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ConfigError;
use crate::constants::UNCATEGORIZED_THEME;
use crate::journey::JourneyStore;

/// Ordered keyword themes used to bucket free-text responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeConfig {
    /// Response fields to theme; empty means every field.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub themes: Vec<ThemePattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemePattern {
    pub label: String,
    pub keywords: Vec<String>,
}

/// Multi-label keyword count over one response field. Unlike
/// [`ThemeConfig`], a response is counted under every label it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordTally {
    pub field: String,
    pub labels: Vec<ThemePattern>,
}

/// Result of a [`KeywordTally`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySummary {
    /// Non-empty responses in the tallied field.
    pub responses: usize,
    /// Responses matching each label; every configured label is present.
    pub counts: BTreeMap<String, usize>,
    pub samples: Vec<Excerpt>,
}

/// A response assigned to a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub persona_id: String,
    pub field: String,
    pub text: String,
}

impl ThemeConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        validate_patterns(&self.themes)
    }

    fn applies_to(&self, field: &str) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f == field)
    }

    /// Label of the first theme with a keyword occurring in `text`,
    /// ignoring case.
    #[must_use]
    pub fn classify(&self, text: &str) -> &str {
        let haystack = text.to_lowercase();
        self.themes
            .iter()
            .find(|theme| theme.matches(&haystack))
            .map_or(UNCATEGORIZED_THEME, |theme| theme.label.as_str())
    }

    /// Partition every non-empty response in the store. Every configured
    /// label appears in the result, as does the uncategorized bucket.
    #[must_use]
    pub fn bucket(&self, store: &JourneyStore) -> BTreeMap<String, Vec<Excerpt>> {
        let mut buckets: BTreeMap<String, Vec<Excerpt>> = self
            .themes
            .iter()
            .map(|theme| (theme.label.clone(), Vec::new()))
            .collect();
        buckets.entry(UNCATEGORIZED_THEME.to_string()).or_default();

        let responses = store.iter().filter_map(|record| {
            record
                .feedback()
                .map(|feedback| (record.persona_id(), &feedback.responses))
        });
        for (persona_id, fields) in responses {
            for (field, text) in fields {
                let text = text.trim();
                if text.is_empty() || !self.applies_to(field) {
                    continue;
                }
                let label = self.classify(text);
                buckets.entry(label.to_string()).or_default().push(Excerpt {
                    persona_id: persona_id.to_string(),
                    field: field.clone(),
                    text: text.to_string(),
                });
            }
        }
        buckets
    }
}

fn validate_patterns(patterns: &[ThemePattern]) -> Result<(), ConfigError> {
    for (index, theme) in patterns.iter().enumerate() {
        if theme.label.trim().is_empty() {
            return Err(ConfigError::EmptyThemeLabel { index });
        }
        if theme.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyThemeKeyword {
                label: theme.label.clone(),
            });
        }
    }
    Ok(())
}

impl ThemePattern {
    fn matches(&self, haystack: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
    }
}

impl KeywordTally {
    pub(crate) fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.field.trim().is_empty() {
            return Err(ConfigError::EmptyTallyField {
                tally: name.to_string(),
            });
        }
        validate_patterns(&self.labels)
    }

    /// Count responses in `field` per label, keeping the first
    /// `sample_limit` responses as samples.
    #[must_use]
    pub fn tally(&self, store: &JourneyStore, sample_limit: usize) -> TallySummary {
        let mut summary = TallySummary {
            counts: self
                .labels
                .iter()
                .map(|label| (label.label.clone(), 0))
                .collect(),
            ..TallySummary::default()
        };
        for record in store {
            let Some(text) = record
                .feedback()
                .and_then(|feedback| feedback.responses.get(&self.field))
                .map(|text| text.trim())
                .filter(|text| !text.is_empty())
            else {
                continue;
            };
            summary.responses += 1;
            let haystack = text.to_lowercase();
            for label in self.labels.iter().filter(|label| label.matches(&haystack)) {
                *summary.counts.entry(label.label.clone()).or_default() += 1;
            }
            if summary.samples.len() < sample_limit {
                summary.samples.push(Excerpt {
                    persona_id: record.persona_id().to_string(),
                    field: self.field.clone(),
                    text: text.to_string(),
                });
            }
        }
        summary
    }
}
