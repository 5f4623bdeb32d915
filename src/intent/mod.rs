//! Text-to-intent resolution.
//!
//! Messages flow through an ordered set of tiers, and the first tier with an answer wins:
//! - [`alias`]: exact single-token aliases ("wfh", "office", "off").
//! - [`named_query`]: "where is X" style questions about people or the team.
//! - [`command`]: reserved keywords ("help", "status", "yes", ...).
//! - [`rules`]: the ordered rule engine.
//! - the optional AI tier, consulted by [`classifier`] when the rules are inconclusive.
//!
//! Inferred results then pass through the [`confirmation`] gate before anything is written.

pub mod alias;
pub mod classifier;
pub mod command;
pub mod confirmation;
pub mod named_query;
pub mod rules;

use serde::Serialize;

use crate::base::types::{AiClassification, AiIntent, WorkLocation};

pub use command::Command;

/// What a message means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntentCategory {
    SetOffice,
    SetRemote,
    /// Not working today; acting on it clears the day's location.
    NotWorking,
    StatusQuery,
    HolidayQuery,
    TeamQuery,
    PersonQuery,
    Unclear,
    Command(Command),
}

impl IntentCategory {
    /// Whether acting on this category writes to the store.
    pub fn is_mutating(&self) -> bool {
        matches!(self, IntentCategory::SetOffice | IntentCategory::SetRemote | IntentCategory::NotWorking)
    }

    /// The location this category sets, if any.
    pub fn location(&self) -> Option<WorkLocation> {
        match self {
            IntentCategory::SetOffice => Some(WorkLocation::Office),
            IntentCategory::SetRemote => Some(WorkLocation::Remote),
            _ => None,
        }
    }

    /// Human-readable description used in confirmations.
    pub fn describe(&self) -> &'static str {
        match self {
            IntentCategory::SetOffice => "working from the office",
            IntentCategory::SetRemote => "working remotely",
            IntentCategory::NotWorking => "not working today",
            IntentCategory::StatusQuery => "asking for your status",
            IntentCategory::HolidayQuery => "asking about holidays",
            IntentCategory::TeamQuery => "asking about your team",
            IntentCategory::PersonQuery => "asking about a colleague",
            IntentCategory::Unclear => "unclear",
            IntentCategory::Command(_) => "a command",
        }
    }
}

impl From<AiIntent> for IntentCategory {
    fn from(intent: AiIntent) -> Self {
        match intent {
            AiIntent::SetOffice => IntentCategory::SetOffice,
            AiIntent::SetRemote => IntentCategory::SetRemote,
            AiIntent::NotWorking => IntentCategory::NotWorking,
            AiIntent::StatusQuery => IntentCategory::StatusQuery,
            AiIntent::HolidayQuery => IntentCategory::HolidayQuery,
            AiIntent::TeamQuery => IntentCategory::TeamQuery,
            AiIntent::PersonQuery => IntentCategory::PersonQuery,
            AiIntent::Unclear => IntentCategory::Unclear,
        }
    }
}

/// The tier that produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Alias,
    Command,
    Rule,
    Ai,
}

impl IntentSource {
    /// Whether results from this tier are inferred rather than exact.
    pub fn is_inferred(&self) -> bool {
        matches!(self, IntentSource::Rule | IntentSource::Ai)
    }

    pub fn label(&self) -> &'static str {
        match self {
            IntentSource::Alias => "alias",
            IntentSource::Command => "command",
            IntentSource::Rule => "rule",
            IntentSource::Ai => "ai",
        }
    }
}

/// The classified meaning of one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedIntent {
    pub category: IntentCategory,
    /// Between 0 and 1.
    pub confidence: f64,
    pub reasoning: String,
    /// The message text the classification was made from.
    pub source_phrase: String,
    pub source: IntentSource,
    /// A person name for person queries.
    pub extracted_entity: Option<String>,
    /// Set when the user said they are working but not where.
    pub prompt_for_location: bool,
}

impl ClassifiedIntent {
    pub fn new(category: IntentCategory, confidence: f64, source: IntentSource, source_phrase: &str, reasoning: impl Into<String>) -> Self {
        Self {
            category,
            confidence,
            reasoning: reasoning.into(),
            source_phrase: source_phrase.to_string(),
            source,
            extracted_entity: None,
            prompt_for_location: false,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.extracted_entity = Some(entity.into());
        self
    }

    pub fn with_location_prompt(mut self) -> Self {
        self.prompt_for_location = true;
        self
    }

    /// Builds an intent from an AI classification.
    pub fn from_ai(classification: AiClassification, source_phrase: &str) -> Self {
        let mut intent = Self::new(classification.intent.into(), classification.confidence, IntentSource::Ai, source_phrase, classification.reasoning);

        if intent.category == IntentCategory::PersonQuery {
            intent.extracted_entity = classification.person_name.filter(|name| !name.trim().is_empty());

            // A person query without a person is a team query.
            if intent.extracted_entity.is_none() {
                intent.category = IntentCategory::TeamQuery;
            }
        }

        intent
    }
}

/// Lowercases, trims and drops trailing sentence punctuation.
pub(crate) fn normalize(text: &str) -> String {
    text.trim().trim_end_matches(['.', '!', '?']).trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ai_person_query_without_name_is_team_query() {
        let intent = ClassifiedIntent::from_ai(
            AiClassification {
                intent: AiIntent::PersonQuery,
                confidence: 0.8,
                reasoning: "asks about someone".to_string(),
                person_name: Some("  ".to_string()),
            },
            "where's the gang",
        );

        assert_eq!(intent.category, IntentCategory::TeamQuery);
        assert_eq!(intent.source, IntentSource::Ai);
    }

    #[test]
    fn test_mutating_categories() {
        assert!(IntentCategory::SetOffice.is_mutating());
        assert!(IntentCategory::NotWorking.is_mutating());
        assert!(!IntentCategory::TeamQuery.is_mutating());
        assert!(!IntentCategory::Command(Command::Status).is_mutating());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Office!! "), "office");
        assert_eq!(normalize("Where is Sam?"), "where is sam");
    }
}
