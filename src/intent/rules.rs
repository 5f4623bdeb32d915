//! Ordered rule engine.
//!
//! Patterns overlap, so the order of [`RULE_GROUPS`] is part of the contract: negation
//! beats location words, self-status beats locations, and so on down to the bare
//! keyword fallback. The first group that matches wins; the last group always matches.

use std::sync::OnceLock;

use regex::Regex;

use super::{ClassifiedIntent, IntentCategory, IntentSource};

macro_rules! regex {
    ($pattern:expr) => {{
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new($pattern).unwrap())
    }};
}

/// A message prepared for matching.
pub struct RuleInput<'a> {
    /// The message as received.
    pub original: &'a str,
    /// Lowercased, trimmed, with typographic apostrophes folded and sentence punctuation removed.
    pub text: String,
}

impl<'a> RuleInput<'a> {
    pub fn new(original: &'a str) -> Self {
        let folded = original.trim().replace(['\u{2019}', '\u{2018}'], "'").to_lowercase();
        let text = folded.trim_end_matches(['.', '!', '?']).trim().to_string();

        Self { original, text }
    }

    fn intent(&self, category: IntentCategory, confidence: f64, reasoning: impl Into<String>) -> ClassifiedIntent {
        ClassifiedIntent::new(category, confidence, IntentSource::Rule, self.original, reasoning)
    }
}

/// One named tier of the rule engine.
pub struct RuleGroup {
    pub name: &'static str,
    matcher: fn(&RuleInput) -> Option<ClassifiedIntent>,
}

impl RuleGroup {
    pub fn evaluate(&self, input: &RuleInput) -> Option<ClassifiedIntent> {
        (self.matcher)(input)
    }
}

/// The rule groups, highest priority first.
pub static RULE_GROUPS: &[RuleGroup] = &[
    RuleGroup { name: "negation", matcher: match_negation },
    RuleGroup { name: "self_status", matcher: match_self_status },
    RuleGroup { name: "specific_location", matcher: match_specific_location },
    RuleGroup { name: "generic_working", matcher: match_generic_working },
    RuleGroup { name: "holiday_query", matcher: match_holiday_query },
    RuleGroup { name: "team_query", matcher: match_team_query },
    RuleGroup { name: "not_working", matcher: match_not_working },
    RuleGroup { name: "bare_keyword", matcher: match_bare_keyword },
    RuleGroup { name: "unclear", matcher: match_unclear },
];

/// Runs the rule groups in order and returns the first match.
pub fn evaluate(text: &str) -> ClassifiedIntent {
    evaluate_with_group(text).1
}

/// Like [`evaluate`], also naming the group that matched.
pub fn evaluate_with_group(text: &str) -> (&'static str, ClassifiedIntent) {
    let input = RuleInput::new(text);

    RULE_GROUPS
        .iter()
        .find_map(|group| group.evaluate(&input).map(|intent| (group.name, intent)))
        .unwrap_or_else(|| ("unclear", unclear(&input)))
}

// Matchers.

/// a. A negation alongside a work term means not working, whatever location is named.
///
/// Word order does not matter: "not in the office" and "office? not today" both count.
fn match_negation(input: &RuleInput) -> Option<ClassifiedIntent> {
    let negation = regex!(r"\b(?:not|never|no longer)\b|n't\b|\b(?:cant|wont|dont|isnt|arent|aint)\b");
    let work_term = regex!(
        r"\b(?:work|working|office|hq|headquarters|home|remote|remotely|wfh|onsite|on-site|into|(?:coming|going|heading) in|in today|in tomorrow|available|online)\b"
    );

    (negation.is_match(&input.text) && work_term.is_match(&input.text))
        .then(|| input.intent(IntentCategory::NotWorking, 0.9, "Negated a work term, which means not working today."))
}

/// b. Questions about one's own recorded location.
fn match_self_status(input: &RuleInput) -> Option<ClassifiedIntent> {
    let re = regex!(
        r"\b(?:where am i|what(?:'s| is) my (?:location|status)|my (?:current )?(?:location|status)\b|did i (?:check in|respond|reply|already)|have i (?:checked in|responded|replied)|what did i (?:say|choose|pick|select)|am i (?:checked in|in the office|at the office|working from home|remote|marked))"
    );

    re.is_match(&input.text)
        .then(|| input.intent(IntentCategory::StatusQuery, 0.9, "Asked about their own status."))
}

/// c. A location together with a context word ("at the office", "working from home").
fn match_specific_location(input: &RuleInput) -> Option<ClassifiedIntent> {
    if is_about_others(input) {
        return None;
    }

    let text = input.text.replace("home office", "home");

    let office = regex!(r"\b(?:at|in|into|from|to)\s+(?:the\s+)?(?:office|hq|headquarters)\b|\b(?:coming|going|heading)\s+in(?:to work)?\b|\bon-?site\b");
    let remote = regex!(r"\b(?:from|at)\s+(?:my\s+)?home\b|\bremote(?:ly)?\b|\bwfh\b|\bworking\s+home\b");

    match (office.is_match(&text), remote.is_match(&text)) {
        (true, true) => Some(
            input
                .intent(IntentCategory::Unclear, 0.5, "Mentioned both the office and home; use the hybrid option on the location card for a split day.")
                .with_location_prompt(),
        ),
        (true, false) => Some(input.intent(IntentCategory::SetOffice, 0.8, "Said they are at the office.")),
        (false, true) => Some(input.intent(IntentCategory::SetRemote, 0.8, "Said they are working remotely.")),
        (false, false) => None,
    }
}

/// d. Working, without saying where.
fn match_generic_working(input: &RuleInput) -> Option<ClassifiedIntent> {
    let re = regex!(r"\b(?:i'm|i am|im|i'll be|i will be|i'll|will be)\s+(?:\w+\s+)?working\b|^working(?:\s+today)?$|\bat work\b");

    re.is_match(&input.text).then(|| {
        input
            .intent(IntentCategory::Unclear, 0.7, "Said they are working but not where.")
            .with_location_prompt()
    })
}

/// e. Questions about public holidays.
fn match_holiday_query(input: &RuleInput) -> Option<ClassifiedIntent> {
    let holiday = regex!(r"\b(?:public holidays?|holidays?|long weekend|day off for everyone)\b");
    let personal = regex!(r"\bon (?:a |my )?(?:holiday|holidays|leave)\b|\b(?:taking|take|took|having|have|had)\s+(?:a\s+)?holiday\b");

    (holiday.is_match(&input.text) && !personal.is_match(&input.text))
        .then(|| input.intent(IntentCategory::HolidayQuery, 0.9, "Asked about public holidays."))
}

/// f. Questions about the team, or about one named colleague.
fn match_team_query(input: &RuleInput) -> Option<ClassifiedIntent> {
    let team = regex!(
        r"\b(?:who(?:'s| is| else)?\s+(?:in|at|working|coming|remote|wfh|home|around|here|else)|who's in|anyone|anybody|everyone|everybody|my team|the team|our team|team status|colleagues|teammates)\b"
    );

    if team.is_match(&input.text) {
        return Some(input.intent(IntentCategory::TeamQuery, 0.9, "Asked about the team."));
    }

    let person = regex!(r"(?i)^(?:is|has)\s+(\p{L}[\p{L}'-]*(?:\s+\p{L}[\p{L}'-]*)?)\s+(?:in|at|working|here|around|coming|remote|wfh|home|off|online|checked)\b");
    let possessive = regex!(r"(?i)^(\p{L}[\p{L}-]*)'s\s+(?:location|status)$");

    let original = input.original.trim().trim_end_matches(['.', '!', '?']).trim();
    let name = person
        .captures(original)
        .or_else(|| possessive.captures(original))
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())?;

    let not_a_name = ["i", "it", "he", "she", "they", "you", "we", "there", "this", "that", "today", "tomorrow", "someone", "somebody"];
    if not_a_name.contains(&name.to_lowercase().as_str()) {
        return None;
    }

    Some(input.intent(IntentCategory::PersonQuery, 0.9, format!("Asked where `{name}` is.")).with_entity(name))
}

/// g. Explicit reasons for not working.
fn match_not_working(input: &RuleInput) -> Option<ClassifiedIntent> {
    let re = regex!(
        r"\b(?:sick|unwell|ill|off sick|on leave|annual leave|sick leave|parental leave|personal leave|day off|off today|taking (?:the|a) day off|on holiday|on holidays|on vacation|vacation|pto|out of office|ooo|rdo|not in)\b"
    );

    re.is_match(&input.text)
        .then(|| input.intent(IntentCategory::NotWorking, 0.85, "Gave a reason for not working."))
}

/// h. Just the word "office" or "home" somewhere.
fn match_bare_keyword(input: &RuleInput) -> Option<ClassifiedIntent> {
    let office = regex!(r"\boffice\b").is_match(&input.text);
    let home = regex!(r"\bhome\b").is_match(&input.text);

    match (office, home) {
        (true, false) => Some(input.intent(IntentCategory::SetOffice, 0.4, "Mentioned the office.")),
        (false, true) => Some(input.intent(IntentCategory::SetRemote, 0.4, "Mentioned home.")),
        _ => None,
    }
}

/// i. Nothing matched.
fn match_unclear(input: &RuleInput) -> Option<ClassifiedIntent> {
    Some(unclear(input))
}

fn unclear(input: &RuleInput) -> ClassifiedIntent {
    input.intent(IntentCategory::Unclear, 0.1, "No rule matched.")
}

/// Questions about other people ("who is in the office", "is anyone home").
fn is_about_others(input: &RuleInput) -> bool {
    let others = regex!(r"\b(?:who|who's|anyone|anybody|everyone|everybody|someone|somebody|people|colleagues|teammates|team)\b");
    let is_x_in = regex!(r"^(?:is|are|has)\s+(?:\p{L}+\s+){1,2}(?:in|at|working|wfh|remote|home)\b");

    others.is_match(&input.text) || is_x_in.is_match(&input.text)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str, group: &str, category: IntentCategory, confidence: f64) {
        let (matched, intent) = evaluate_with_group(text);

        assert_eq!(matched, group, "group for {text:?}");
        assert_eq!(intent.category, category, "category for {text:?}");
        assert_eq!(intent.confidence, confidence, "confidence for {text:?}");
        assert_eq!(intent.source, IntentSource::Rule);
        assert_eq!(intent.source_phrase, text);
    }

    #[test]
    fn test_group_order_is_stable() {
        let names: Vec<_> = RULE_GROUPS.iter().map(|group| group.name).collect();

        assert_eq!(
            names,
            ["negation", "self_status", "specific_location", "generic_working", "holiday_query", "team_query", "not_working", "bare_keyword", "unclear"]
        );
    }

    #[test]
    fn test_negation_dominates_locations() {
        for text in [
            "I am not working from home today",
            "I'm not working at the office",
            "Not working today.",
            "I won't be in the office",
            "I can’t work today, sick",
            "I am NOT working from the office",
            "I am not going into HQ",
            "I'm not going in",
            "Office? Not today.",
            "home - not today",
            "office no longer",
        ] {
            let intent = evaluate(text);
            assert_eq!(intent.category, IntentCategory::NotWorking, "{text}");
            assert!(intent.confidence >= 0.85, "{text}");
        }
    }

    #[test]
    fn test_bare_no_is_not_a_negation() {
        check("no, I'm working from home", "specific_location", IntentCategory::SetRemote, 0.8);
    }

    #[test]
    fn test_self_status() {
        check("where am I today?", "self_status", IntentCategory::StatusQuery, 0.9);
        check("What's my location", "self_status", IntentCategory::StatusQuery, 0.9);
        check("am I in the office today?", "self_status", IntentCategory::StatusQuery, 0.9);
    }

    #[test]
    fn test_specific_locations() {
        check("I'm working from home today", "specific_location", IntentCategory::SetRemote, 0.8);
        check("In the office today", "specific_location", IntentCategory::SetOffice, 0.8);
        check("heading into the office", "specific_location", IntentCategory::SetOffice, 0.8);
        check("working remotely", "specific_location", IntentCategory::SetRemote, 0.8);
        check("working from my home office", "specific_location", IntentCategory::SetRemote, 0.8);
    }

    #[test]
    fn test_both_locations_are_unclear() {
        let (group, intent) = evaluate_with_group("in the office this morning, then working from home");

        assert_eq!(group, "specific_location");
        assert_eq!(intent.category, IntentCategory::Unclear);
        assert_eq!(intent.confidence, 0.5);
        assert!(intent.reasoning.contains("hybrid"));
        assert!(intent.prompt_for_location);
    }

    #[test]
    fn test_questions_about_others_are_team_queries() {
        check("who is in the office today?", "team_query", IntentCategory::TeamQuery, 0.9);
        check("is anyone at home", "team_query", IntentCategory::TeamQuery, 0.9);
    }

    #[test]
    fn test_person_query_with_name() {
        let (group, intent) = evaluate_with_group("Is Sam working from home?");

        assert_eq!(group, "team_query");
        assert_eq!(intent.category, IntentCategory::PersonQuery);
        assert_eq!(intent.extracted_entity.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_generic_working_prompts_for_location() {
        let (group, intent) = evaluate_with_group("I'm working today");

        assert_eq!(group, "generic_working");
        assert_eq!(intent.category, IntentCategory::Unclear);
        assert_eq!(intent.confidence, 0.7);
        assert!(intent.prompt_for_location);
    }

    #[test]
    fn test_holiday_query() {
        check("when is the next public holiday?", "holiday_query", IntentCategory::HolidayQuery, 0.9);
        check("any holidays coming up", "holiday_query", IntentCategory::HolidayQuery, 0.9);
    }

    #[test]
    fn test_personal_holiday_is_not_working() {
        check("I'm on holiday", "not_working", IntentCategory::NotWorking, 0.85);
    }

    #[test]
    fn test_not_working_phrases() {
        check("feeling sick", "not_working", IntentCategory::NotWorking, 0.85);
        check("taking a day off", "not_working", IntentCategory::NotWorking, 0.85);
        check("on annual leave", "not_working", IntentCategory::NotWorking, 0.85);
    }

    #[test]
    fn test_bare_keywords() {
        check("office pls", "bare_keyword", IntentCategory::SetOffice, 0.4);
        check("home today", "bare_keyword", IntentCategory::SetRemote, 0.4);
    }

    #[test]
    fn test_fallback_is_unclear() {
        check("banana", "unclear", IntentCategory::Unclear, 0.1);
        check("", "unclear", IntentCategory::Unclear, 0.1);
    }
}
