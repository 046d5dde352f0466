use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::ConfigError;
use crate::constants::{RATING_MAX, RATING_MIN, RATING_PASS};

/// Survey rating on the closed 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// # Errors
    ///
    /// Returns [`ConfigError::RatingOutOfRange`] outside `1..=5`.
    pub fn new(value: u8) -> Result<Self, ConfigError> {
        if !(RATING_MIN..=RATING_MAX).contains(&value) {
            return Err(ConfigError::RatingOutOfRange { value });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Rated 4 or 5.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 >= RATING_PASS
    }
}

impl TryFrom<u8> for Rating {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Post-journey survey answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Feedback {
    #[serde(default)]
    pub ratings: BTreeMap<String, Rating>,
    #[serde(default)]
    pub responses: BTreeMap<String, String>,
}

impl Feedback {
    #[must_use]
    pub fn with_rating(mut self, dimension: impl Into<String>, rating: Rating) -> Self {
        self.ratings.insert(dimension.into(), rating);
        self
    }

    #[must_use]
    pub fn with_response(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.responses.insert(field.into(), text.into());
        self
    }

    #[must_use]
    pub fn rating(&self, dimension: &str) -> Option<Rating> {
        self.ratings.get(dimension).copied()
    }

    #[must_use]
    pub fn response(&self, field: &str) -> Option<&str> {
        self.responses.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty() && self.responses.is_empty()
    }
}
