//! Reserved command keywords.

use serde::Serialize;

use super::{ClassifiedIntent, IntentCategory, IntentSource, normalize};

/// A deterministic command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Help,
    Status,
    Stats,
    History,
    Team,
    Holidays,
    /// Show the location card.
    CheckIn,
    Yes,
    No,
}

impl Command {
    /// Parses a whole message as a command keyword.
    pub fn parse(text: &str) -> Option<Self> {
        let command = match normalize(text).as_str() {
            "help" | "?" | "commands" => Command::Help,
            "status" | "my status" => Command::Status,
            "stats" | "statistics" => Command::Stats,
            "history" | "my history" => Command::History,
            "team" | "team status" => Command::Team,
            "holidays" | "holiday" | "public holidays" => Command::Holidays,
            "checkin" | "check in" | "check-in" | "card" | "location" => Command::CheckIn,
            "yes" | "y" | "yep" | "yeah" | "confirm" => Command::Yes,
            "no" | "n" | "nope" | "cancel" => Command::No,
            _ => return None,
        };

        Some(command)
    }

    /// Classifies a message, if it is exactly a command.
    pub fn classify(text: &str) -> Option<ClassifiedIntent> {
        let command = Self::parse(text)?;

        Some(ClassifiedIntent::new(IntentCategory::Command(command), 1.0, IntentSource::Command, text, "Matched a command keyword."))
    }
}

/// The command list shown in help and "didn't understand" replies.
pub const COMMAND_HELP: &str = "\
- **office** / **remote**: record where you are working today
- **off**: clear today's location (not working)
- **status**: show your location for today
- **history**: show today's updates
- **team**: show where your team is today
- **where is <name>**: find a colleague
- **stats**: show today's check-in statistics
- **holidays**: show upcoming public holidays
- **checkin**: show the location card";
