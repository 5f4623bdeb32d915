//! Card templates.
//!
//! Every action carries an `action` field that the submission handler dispatches on.

use chrono::NaiveDate;
use serde_json::json;

use super::types::{Card, CardAction, CardBlock, CardInput, WorkLocation};
use crate::intent::ClassifiedIntent;

// Action names echoed back in submissions.

/// Records a full-day location.
pub const ACTION_SET_LOCATION: &str = "set_location";
/// Records a morning/afternoon split.
pub const ACTION_SET_HYBRID: &str = "set_hybrid";
/// Clears today's location.
pub const ACTION_CLEAR_LOCATION: &str = "clear_location";
/// Answers a confirmation card.
pub const ACTION_CONFIRM: &str = "confirm";

/// Number of reminder tiers shown on reminder cards.
pub const REMINDER_TIERS: u32 = 2;

fn half_day_choices() -> Vec<(String, String)> {
    [WorkLocation::Remote, WorkLocation::Office]
        .iter()
        .map(|location| (location.label().to_string(), location.label().to_lowercase()))
        .collect()
}

fn location_actions() -> Vec<CardAction> {
    vec![
        CardAction {
            title: format!("{} Remote", WorkLocation::Remote.emoji()),
            data: json!({ "action": ACTION_SET_LOCATION, "location": "remote" }),
        },
        CardAction {
            title: format!("{} Office", WorkLocation::Office.emoji()),
            data: json!({ "action": ACTION_SET_LOCATION, "location": "office" }),
        },
        CardAction {
            title: format!("{} Hybrid (AM/PM)", WorkLocation::Hybrid.emoji()),
            data: json!({ "action": ACTION_SET_HYBRID }),
        },
        CardAction {
            title: "Not working".to_string(),
            data: json!({ "action": ACTION_CLEAR_LOCATION }),
        },
    ]
}

fn location_inputs() -> Vec<CardInput> {
    vec![
        CardInput {
            id: "morning".to_string(),
            label: "Morning (hybrid only)".to_string(),
            choices: half_day_choices(),
        },
        CardInput {
            id: "afternoon".to_string(),
            label: "Afternoon (hybrid only)".to_string(),
            choices: half_day_choices(),
        },
    ]
}

/// The daily location-selection card.
pub fn location_card(date: NaiveDate) -> Card {
    Card {
        title: "Where are you working today?".to_string(),
        body: vec![CardBlock::Text(format!("Please record your work location for {}.", date.format("%A %-d %B %Y")))],
        inputs: location_inputs(),
        actions: location_actions(),
    }
}

/// A reminder for someone who has not answered yet.
pub fn reminder_card(date: NaiveDate, tier: u32) -> Card {
    Card {
        title: format!("Reminder {tier} of {REMINDER_TIERS}: where are you working today?"),
        body: vec![CardBlock::Text(format!("We haven't heard from you yet for {}.", date.format("%A %-d %B %Y")))],
        inputs: location_inputs(),
        actions: location_actions(),
    }
}

/// Asks the user to confirm an inferred intent.
pub fn confirmation_card(intent: &ClassifiedIntent) -> Card {
    Card {
        title: "Did I get that right?".to_string(),
        body: vec![
            CardBlock::Text(format!("It sounds like you are **{}**.", intent.category.describe())),
            CardBlock::Facts(vec![
                ("You said".to_string(), intent.source_phrase.clone()),
                ("Interpreted as".to_string(), intent.category.describe().to_string()),
                ("Confidence".to_string(), format!("{:.0}%", intent.confidence * 100.0)),
                ("Source".to_string(), intent.source.label().to_string()),
                ("Reasoning".to_string(), intent.reasoning.clone()),
            ]),
        ],
        inputs: Vec::new(),
        actions: vec![
            CardAction {
                title: "Yes".to_string(),
                data: json!({ "action": ACTION_CONFIRM, "accepted": true }),
            },
            CardAction {
                title: "No".to_string(),
                data: json!({ "action": ACTION_CONFIRM, "accepted": false }),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{IntentCategory, IntentSource};

    #[test]
    fn test_confirmation_card_carries_audit_facts() {
        let intent = ClassifiedIntent::new(IntentCategory::SetRemote, 0.8, IntentSource::Rule, "working from home", "Said they are working remotely.");
        let card = confirmation_card(&intent);

        let Some(CardBlock::Facts(facts)) = card.body.get(1) else {
            panic!("missing facts");
        };

        assert!(facts.contains(&("You said".to_string(), "working from home".to_string())));
        assert!(facts.contains(&("Confidence".to_string(), "80%".to_string())));
        assert!(facts.contains(&("Source".to_string(), "rule".to_string())));
        assert_eq!(card.actions.len(), 2);
    }

    #[test]
    fn test_reminder_card_names_tier() {
        let card = reminder_card(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), 2);

        assert!(card.title.starts_with("Reminder 2 of 2"));
        assert_eq!(card.actions.len(), 4);
    }
}
