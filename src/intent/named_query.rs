//! "Where is X" slot filling.
//!
//! Recognises questions about a named colleague and extracts the name. Team-wide words
//! ("everyone", "my team") turn the question into a team query instead.

use std::sync::OnceLock;

use regex::Regex;

use super::{ClassifiedIntent, IntentCategory, IntentSource};

/// Longest accepted person name, in words.
const MAX_NAME_WORDS: usize = 4;

const CONFIDENCE: f64 = 0.9;

fn time_qualifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[\s,]+(?:today|now|right now|this morning|this afternoon|currently|at the moment|atm)$").unwrap())
}

fn name_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:working|located|based|sitting)$").unwrap())
}

fn negation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:not|never|no longer)\b|n't\b").unwrap())
}

fn trailing_negation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:not|never|no longer)$").unwrap())
}

fn query_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)^(?:where\s+is|where's|wheres|where\s+are)\s+(.+)$",
            r"(?i)^(?:what\s+is\s+(?:the\s+)?)?location\s+of\s+(.+)$",
            r"(?i)^(?:find|locate)\s+(.+)$",
            r"(?i)^is\s+(.+?)\s+(?:in|at)\s+(?:the\s+)?(?:office|work|home)$",
            r"(?i)^is\s+(.+?)\s+working\s+(?:from\s+home|remotely|remote|from\s+the\s+office|in\s+the\s+office)$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
    })
}

const TEAM_WORDS: &[&str] = &[
    "team",
    "my team",
    "the team",
    "our team",
    "everyone",
    "everybody",
    "every one",
    "colleagues",
    "my colleagues",
    "teammates",
    "my teammates",
    "the gang",
    "people",
    "all",
];

const SELF_WORDS: &[&str] = &["me", "i", "myself"];

/// Removes trailing punctuation and time qualifiers ("today", "right now", ...).
pub fn strip_qualifiers(text: &str) -> String {
    let mut current = text.trim().trim_end_matches(['?', '.', '!']).trim().to_string();

    loop {
        let stripped = time_qualifier_re().replace(&current, "").trim_end_matches([',', ' ']).to_string();
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Classifies "where is X" style questions.
pub fn classify(text: &str) -> Option<ClassifiedIntent> {
    let cleaned = strip_qualifiers(text);

    let captured = query_res().iter().find_map(|pattern| pattern.captures(&cleaned).and_then(|captures| captures.get(1)))?;

    let entity = name_suffix_re().replace(captured.as_str().trim(), "");
    // "is Sam not in the office" still asks about Sam.
    let entity = trailing_negation_re().replace(entity.trim(), "");
    let entity = entity.trim().trim_start_matches('@').trim();
    let lowered = entity.to_lowercase();

    if TEAM_WORDS.contains(&lowered.as_str()) {
        return Some(ClassifiedIntent::new(IntentCategory::TeamQuery, CONFIDENCE, IntentSource::Rule, text, format!("Asked about `{entity}`, which means the whole team.")));
    }

    if SELF_WORDS.contains(&lowered.as_str()) || lowered.starts_with("my ") {
        return Some(ClassifiedIntent::new(IntentCategory::StatusQuery, CONFIDENCE, IntentSource::Rule, text, "Asked about themselves."));
    }

    let words = entity.split_whitespace().count();
    if entity.is_empty() || negation_re().is_match(entity) || words > MAX_NAME_WORDS || lowered.starts_with("the ") || !entity.chars().any(char::is_alphabetic) {
        return None;
    }

    Some(ClassifiedIntent::new(IntentCategory::PersonQuery, CONFIDENCE, IntentSource::Rule, text, format!("Asked where `{entity}` is.")).with_entity(entity))
}
