//! Parsing of card submissions.

use serde_json::Value;

use crate::base::{
    cards::{ACTION_CLEAR_LOCATION, ACTION_CONFIRM, ACTION_SET_HYBRID, ACTION_SET_LOCATION},
    types::WorkLocation,
};

/// A validated card submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    SetLocation(WorkLocation),
    SetHybrid { morning: WorkLocation, afternoon: WorkLocation },
    Clear,
    Confirm(bool),
}

/// Why a submission was rejected; the message is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    UnknownAction,
    MissingLocation,
    MissingHalfDay,
    InvalidHalfDay(String),
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::UnknownAction => f.write_str("Sorry, I didn't recognise that button. Please try the latest card."),
            SubmissionError::MissingLocation => f.write_str("Please choose **Remote** or **Office**."),
            SubmissionError::MissingHalfDay => f.write_str("For a hybrid day, please choose both a **morning** and an **afternoon** location."),
            SubmissionError::InvalidHalfDay(value) => write!(f, "`{value}` isn't a location I know. Please choose **Remote** or **Office**."),
        }
    }
}

fn field<'a>(data: &'a Value, name: &str) -> Option<&'a str> {
    data.get(name).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

fn half_day(data: &Value, name: &str) -> Result<WorkLocation, SubmissionError> {
    let value = field(data, name).ok_or(SubmissionError::MissingHalfDay)?;

    match WorkLocation::parse(value) {
        Some(location @ (WorkLocation::Remote | WorkLocation::Office)) => Ok(location),
        _ => Err(SubmissionError::InvalidHalfDay(value.to_string())),
    }
}

/// Parses the data of a submitted card.
pub fn parse(data: &Value) -> Result<Submission, SubmissionError> {
    match field(data, "action") {
        Some(ACTION_SET_LOCATION) => match field(data, "location").and_then(WorkLocation::parse) {
            Some(location @ (WorkLocation::Remote | WorkLocation::Office)) => Ok(Submission::SetLocation(location)),
            _ => Err(SubmissionError::MissingLocation),
        },
        Some(ACTION_SET_HYBRID) => {
            let morning = half_day(data, "morning")?;
            let afternoon = half_day(data, "afternoon")?;

            Ok(Submission::SetHybrid { morning, afternoon })
        }
        Some(ACTION_CLEAR_LOCATION) => Ok(Submission::Clear),
        Some(ACTION_CONFIRM) => Ok(Submission::Confirm(data.get("accepted").and_then(Value::as_bool).unwrap_or(false))),
        _ => Err(SubmissionError::UnknownAction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_location() {
        assert_eq!(parse(&json!({ "action": "set_location", "location": "office" })), Ok(Submission::SetLocation(WorkLocation::Office)));
        assert_eq!(parse(&json!({ "action": "set_location", "location": "hybrid" })), Err(SubmissionError::MissingLocation));
        assert_eq!(parse(&json!({ "action": "set_location" })), Err(SubmissionError::MissingLocation));
    }

    #[test]
    fn test_hybrid_needs_both_half_days() {
        let full = json!({ "action": "set_hybrid", "morning": "office", "afternoon": "remote" });
        assert_eq!(
            parse(&full),
            Ok(Submission::SetHybrid {
                morning: WorkLocation::Office,
                afternoon: WorkLocation::Remote
            })
        );

        assert_eq!(parse(&json!({ "action": "set_hybrid", "morning": "office" })), Err(SubmissionError::MissingHalfDay));
        assert_eq!(parse(&json!({ "action": "set_hybrid", "morning": "office", "afternoon": "" })), Err(SubmissionError::MissingHalfDay));
        assert_eq!(
            parse(&json!({ "action": "set_hybrid", "morning": "beach", "afternoon": "office" })),
            Err(SubmissionError::InvalidHalfDay("beach".to_string()))
        );
    }

    #[test]
    fn test_clear_and_confirm() {
        assert_eq!(parse(&json!({ "action": "clear_location" })), Ok(Submission::Clear));
        assert_eq!(parse(&json!({ "action": "confirm", "accepted": true })), Ok(Submission::Confirm(true)));
        assert_eq!(parse(&json!({ "action": "confirm" })), Ok(Submission::Confirm(false)));
        assert_eq!(parse(&json!({ "foo": "bar" })), Err(SubmissionError::UnknownAction));
    }
}
