use rand::Rng;
use regex::Regex;
use thiserror::Error;
use upstander_engine::{
    AttributeKey, Feedback, JourneyRecord, JourneyStore, NodeKind, Persona, PersonaRoster, Rating,
    ScenarioGraph,
};

use crate::util::stream_rng;

/// Rated questions, in survey order.
pub const RATING_QUESTIONS: [(&str, &str); 5] = [
    ("realistic", "REALISM"),
    ("felt_safe", "SAFETY & TRAUMA-INFORMED DESIGN"),
    ("helpful_feedback", "FEEDBACK QUALITY"),
    ("would_recommend", "RECOMMENDATION"),
    ("confidence", "CONFIDENCE CHANGE"),
];

/// Open questions, numbered after the rated ones.
pub const TEXT_QUESTIONS: [(&str, &str); 5] = [
    ("most_valuable_scenario", "MOST VALUABLE SCENARIO"),
    ("likely_strategy", "LIKELY STRATEGY"),
    ("what_worked", "WHAT WORKED WELL"),
    ("improvements", "IMPROVEMENTS NEEDED"),
    ("cultural_relevance", "CULTURAL RELEVANCE"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurveyError {
    #[error("survey response has no numbered sections")]
    NoSections,
    #[error("no persona `{0}` in roster")]
    UnknownPersona(String),
}

/// Writes deterministic survey answers for finished journeys.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticRespondent {
    seed: u64,
}

impl SyntheticRespondent {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Numbered free-text response in the survey's `Rate:`/`Explain:`/`Answer:` layout.
    #[must_use]
    pub fn respond(&self, graph: &ScenarioGraph, persona: &Persona, record: &JourneyRecord) -> String {
        let mut rng = stream_rng(self.seed, &persona.id, "survey");
        let mut sections = Vec::with_capacity(RATING_QUESTIONS.len() + TEXT_QUESTIONS.len());

        for (idx, (dimension, title)) in RATING_QUESTIONS.iter().enumerate() {
            let rating = match rng.gen_range(0..100) {
                0..=54 => 5,
                55..=87 => 4,
                88..=96 => 3,
                _ => 2,
            };
            sections.push(format!(
                "{}. {title}\nRate: {rating}\nExplain: {}",
                idx + 1,
                explanation(dimension, rating)
            ));
        }

        let scenarios: Vec<&str> = record
            .visited_node_ids()
            .iter()
            .filter_map(|id| graph.get_node(id).ok())
            .filter(|node| node.kind == NodeKind::Decision && !node.title.is_empty())
            .map(|node| node.title.as_str())
            .collect();
        let favourite = if scenarios.is_empty() {
            "the opening scene".to_string()
        } else {
            scenarios[rng.gen_range(0..scenarios.len())].to_string()
        };
        let nationality = persona
            .text(AttributeKey::Nationality)
            .unwrap_or("my background");

        let answers = [
            format!("{favourite} stood out because it felt close to what happens around campus."),
            strategy_answer(record),
            "The character choice and the skill tally kept me engaged.".to_string(),
            "Add more scenarios set online and in shared housing.".to_string(),
            cultural_answer(nationality, rng.gen_range(0..3)),
        ];
        for (idx, ((_, title), answer)) in TEXT_QUESTIONS.iter().zip(answers).enumerate() {
            sections.push(format!(
                "{}. {title}\nAnswer: {answer}",
                RATING_QUESTIONS.len() + idx + 1
            ));
        }

        sections.join("\n\n")
    }
}

fn cultural_answer(nationality: &str, variant: u8) -> String {
    match variant {
        0 => format!("The cast felt inclusive and respectful to someone from {nationality}."),
        1 => format!(
            "As someone from {nationality}, I saw my perspective reflected, though it could include more international students."
        ),
        _ => format!("Missing some context for students from {nationality}."),
    }
}

fn explanation(dimension: &str, rating: u8) -> String {
    let tone = if rating >= 4 { "mostly" } else { "only partly" };
    format!("The module {tone} met my expectations for {}.", dimension.replace('_', " "))
}

/// Names the intervention family matching the journey's strongest skill.
fn strategy_answer(record: &JourneyRecord) -> String {
    let top = record
        .final_skills()
        .iter()
        .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
        .map(|(skill, _)| skill);
    match top {
        Some("direct_intervention") => {
            "Direct. I would speak up to the person causing harm when it is safe.".to_string()
        }
        Some("distraction") => {
            "Distraction. I would interrupt by spilling a drink or starting a conversation."
                .to_string()
        }
        Some("know_resources") => {
            "Delegation. I would delegate to an RA or campus security.".to_string()
        }
        _ => "Delay. I would check in with the person afterwards and offer support.".to_string(),
    }
}

/// Turns a numbered survey response into [`Feedback`].
pub struct SurveyParser {
    section: Regex,
    rate: Regex,
    explain: Regex,
    answer: Regex,
}

impl SurveyParser {
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            section: Regex::new(r"(?m)^[ \t]*(\d+)\.[ \t]+[A-Z][A-Z&\- ]*[ \t]*$")?,
            rate: Regex::new(r"(?i)Rate:\s*(\d+)")?,
            explain: Regex::new(r"(?is)Explain:\s*(.+)")?,
            answer: Regex::new(r"(?is)Answer:\s*(.+)")?,
        })
    }

    /// Out-of-scale or unreadable ratings are left out rather than defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`SurveyError::NoSections`] if no numbered title line is found.
    /// Numbered lines inside an answer do not start a section.
    pub fn parse(&self, response: &str) -> Result<Feedback, SurveyError> {
        let marks: Vec<(usize, usize, usize)> = self
            .section
            .captures_iter(response)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1)?.as_str().parse().ok()?;
                Some((number, whole.start(), whole.end()))
            })
            .collect();
        if marks.is_empty() {
            return Err(SurveyError::NoSections);
        }

        let mut feedback = Feedback::default();
        for (idx, &(number, _, body_start)) in marks.iter().enumerate() {
            let body_end = marks.get(idx + 1).map_or(response.len(), |next| next.1);
            let body = &response[body_start..body_end];

            if let Some(&(dimension, _)) = number.checked_sub(1).and_then(|i| RATING_QUESTIONS.get(i)) {
                let rating = self
                    .rate
                    .captures(body)
                    .and_then(|caps| caps[1].parse::<u8>().ok())
                    .and_then(|value| Rating::new(value).ok());
                if let Some(rating) = rating {
                    feedback.ratings.insert(dimension.to_string(), rating);
                } else {
                    log::debug!("no usable rating for `{dimension}`");
                }
                if let Some(text) = capture_text(&self.explain, body) {
                    feedback.responses.insert(format!("{dimension}_explain"), text);
                }
            } else if let Some(&(field, _)) = number
                .checked_sub(RATING_QUESTIONS.len() + 1)
                .and_then(|i| TEXT_QUESTIONS.get(i))
                && let Some(text) = capture_text(&self.answer, body)
            {
                feedback.responses.insert(field.to_string(), text);
            }
        }
        Ok(feedback)
    }
}

fn capture_text(pattern: &Regex, body: &str) -> Option<String> {
    let text = pattern.captures(body)?.get(1)?.as_str().trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Survey every completed journey; truncated journeys keep no feedback.
///
/// # Errors
///
/// Returns an error if a record names a persona missing from `roster` or a
/// response cannot be parsed.
pub fn attach_feedback(
    store: JourneyStore,
    graph: &ScenarioGraph,
    roster: &PersonaRoster,
    respondent: &SyntheticRespondent,
    parser: &SurveyParser,
) -> Result<JourneyStore, SurveyError> {
    store
        .into_iter()
        .map(|record| {
            if !record.completed() {
                return Ok(record);
            }
            let persona = roster
                .get_by_id(record.persona_id())
                .ok_or_else(|| SurveyError::UnknownPersona(record.persona_id().to_string()))?;
            let response = respondent.respond(graph, persona, &record);
            let feedback = parser.parse(&response)?;
            Ok(record.with_feedback(feedback))
        })
        .collect()
}
