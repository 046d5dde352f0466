use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of descriptor keys a persona may carry.
///
/// Rosters naming any other key fail to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    Age,
    Nationality,
    Residence,
    Occupation,
    Archetype,
    PersonalityTraits,
    ProfessionalInterests,
    InterventionStyle,
    PriorGbvTraining,
    ComfortWithConfrontation,
    PeerInfluence,
    InitialAttitude,
    InfluencedBy,
    CulturalConsiderations,
    LanguageConfidence,
    TraumaAwareness,
    Evaluates,
    ProfessionalResponsibility,
    MedicalPerspective,
    LeadershipExperience,
    IntersectionalLens,
    CommunityFocus,
    AnalyticalApproach,
    Needs,
    Prefers,
    Wants,
}

impl AttributeKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Nationality => "nationality",
            Self::Residence => "residence",
            Self::Occupation => "occupation",
            Self::Archetype => "archetype",
            Self::PersonalityTraits => "personality_traits",
            Self::ProfessionalInterests => "professional_interests",
            Self::InterventionStyle => "intervention_style",
            Self::PriorGbvTraining => "prior_gbv_training",
            Self::ComfortWithConfrontation => "comfort_with_confrontation",
            Self::PeerInfluence => "peer_influence",
            Self::InitialAttitude => "initial_attitude",
            Self::InfluencedBy => "influenced_by",
            Self::CulturalConsiderations => "cultural_considerations",
            Self::LanguageConfidence => "language_confidence",
            Self::TraumaAwareness => "trauma_awareness",
            Self::Evaluates => "evaluates",
            Self::ProfessionalResponsibility => "professional_responsibility",
            Self::MedicalPerspective => "medical_perspective",
            Self::LeadershipExperience => "leadership_experience",
            Self::IntersectionalLens => "intersectional_lens",
            Self::CommunityFocus => "community_focus",
            Self::AnalyticalApproach => "analytical_approach",
            Self::Needs => "needs",
            Self::Prefers => "prefers",
            Self::Wants => "wants",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute payload: free text, an integer, or a list of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
}

impl AttributeValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join("; ")),
        }
    }
}

/// Synthetic participant descriptor. Opaque to traversal; only policies read
/// the attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<AttributeKey, AttributeValue>,
}

impl Persona {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: AttributeKey, value: AttributeValue) -> Self {
        self.attributes.insert(key, value);
        self
    }

    #[must_use]
    pub fn attribute(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(&key)
    }

    /// Text attribute, if present and textual.
    #[must_use]
    pub fn text(&self, key: AttributeKey) -> Option<&str> {
        self.attribute(key).and_then(AttributeValue::as_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PersonaRoster(pub Vec<Persona>);

impl PersonaRoster {
    #[must_use]
    pub const fn empty() -> Self {
        Self(vec![])
    }

    /// Load a roster from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or names an unknown attribute key.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&Persona> {
        self.0.iter().find(|p| p.id == id)
    }

    /// Keep only the first `limit` personas.
    pub fn truncate(&mut self, limit: usize) {
        self.0.truncate(limit);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Persona> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a PersonaRoster {
    type Item = &'a Persona;
    type IntoIter = std::slice::Iter<'a, Persona>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for PersonaRoster {
    type Item = Persona;
    type IntoIter = std::vec::IntoIter<Persona>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
