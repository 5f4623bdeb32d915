//! Shared types: result aliases, locations, message payloads and cards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The error type used across the crate.
pub type Err = anyhow::Error;
/// A result with the crate error type.
pub type Res<T> = Result<T, Err>;
/// A result with no value.
pub type Void = Res<()>;

// Locations.

/// Where a user works for a given day.
///
/// `Hybrid` is the legacy AM/PM split; it is only ever recorded together with
/// both half-day locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkLocation {
    /// Working from home or elsewhere off-site.
    Remote,
    /// Working at the office.
    Office,
    /// Split between remote and office across the day.
    Hybrid,
}

impl WorkLocation {
    /// Human-readable label used in replies and cards.
    pub fn label(&self) -> &'static str {
        match self {
            WorkLocation::Remote => "Remote",
            WorkLocation::Office => "Office",
            WorkLocation::Hybrid => "Hybrid",
        }
    }

    /// Emoji shown next to the label.
    pub fn emoji(&self) -> &'static str {
        match self {
            WorkLocation::Remote => "🏠",
            WorkLocation::Office => "🏢",
            WorkLocation::Hybrid => "🔀",
        }
    }

    /// Parses a location from a card submission value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "remote" | "home" | "wfh" => Some(WorkLocation::Remote),
            "office" | "onsite" => Some(WorkLocation::Office),
            "hybrid" => Some(WorkLocation::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// Inbound.

/// A message delivered to the bot by the messaging channel.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// The organization the sender belongs to.
    pub tenant_id: String,
    /// The sender's channel identity.
    pub user_id: String,
    /// The sender's display name.
    pub display_name: String,
    /// The sender's email, when the channel supplied it.
    pub email: Option<String>,
    /// The conversation the message arrived in.
    pub conversation_id: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// The message content.
    pub body: InboundBody,
}

/// The payload of an inbound message: free text, or the data of a submitted card.
#[derive(Debug, Clone)]
pub enum InboundBody {
    /// Free text typed by the user.
    Text(String),
    /// The data of a submitted card action.
    Submission(Value),
}

// Outbound.

/// A payload the bot wants delivered to a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outbound {
    /// A plain (markdown) text message.
    Text(String),
    /// An interactive card.
    Card(Card),
}

impl Outbound {
    /// Creates a plain text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text(text.into())
    }

    /// Returns the text if this is a plain text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Outbound::Text(text) => Some(text),
            Outbound::Card(_) => None,
        }
    }

    /// Returns the card if this is a card payload.
    pub fn as_card(&self) -> Option<&Card> {
        match self {
            Outbound::Card(card) => Some(card),
            Outbound::Text(_) => None,
        }
    }
}

/// A channel-agnostic card description.
///
/// The chat service renders it into whatever the channel supports. Action data is
/// echoed back verbatim as an [`InboundBody::Submission`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Card {
    /// The heading.
    pub title: String,
    /// Content shown under the heading.
    pub body: Vec<CardBlock>,
    /// Choices submitted along with an action.
    pub inputs: Vec<CardInput>,
    /// The buttons.
    pub actions: Vec<CardAction>,
}

/// A piece of card content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CardBlock {
    /// A paragraph of markdown text.
    Text(String),
    /// Label/value pairs.
    Facts(Vec<(String, String)>),
}

/// A single-choice input; its selected value is merged into the submitted data under `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardInput {
    /// The key the selected value is submitted under.
    pub id: String,
    /// Label shown next to the input.
    pub label: String,
    /// `(title, value)` pairs to choose from.
    pub choices: Vec<(String, String)>,
}

/// A card button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardAction {
    /// The button text.
    pub title: String,
    /// Data submitted when the button is pressed.
    pub data: Value,
}

// Calendar.

/// A named public holiday.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Holiday {
    /// The day of the holiday.
    pub date: chrono::NaiveDate,
    /// The holiday's name.
    pub name: String,
}

// Classifier output.

/// An intent label produced by the AI classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiIntent {
    /// Working at the office today.
    SetOffice,
    /// Working remotely today.
    SetRemote,
    /// Not working today.
    NotWorking,
    /// Asking about their own status.
    StatusQuery,
    /// Asking about public holidays.
    HolidayQuery,
    /// Asking about the team.
    TeamQuery,
    /// Asking about a named colleague.
    PersonQuery,
    /// None of the above.
    Unclear,
}

/// The structured result returned by the AI classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiClassification {
    /// The chosen intent.
    pub intent: AiIntent,
    /// Confidence between 0 and 1.
    pub confidence: f64,
    /// A short explanation of the choice.
    #[serde(default)]
    pub reasoning: String,
    /// The colleague asked about, for person queries.
    #[serde(default)]
    pub person_name: Option<String>,
}
