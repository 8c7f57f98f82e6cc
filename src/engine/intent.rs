//! Turn intent classification.
//!
//! An ordered rule table of `(pattern, intent)` pairs replaces free-text
//! branching so the rule set stays inspectable and testable on its own.
//! Query rules are evaluated first and unmatched input also falls back to
//! [`Intent::Query`]: a lookup is idempotent, while misfiling a query as a
//! report risks persisting malformed data.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::extract::find_known_drug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Report,
    Query,
}

/// One row of the classification table.
pub struct ClassifierRule {
    pub name: &'static str,
    pub intent: Intent,
    pattern: Regex,
}

impl ClassifierRule {
    fn new(name: &'static str, intent: Intent, pattern: &str) -> Self {
        Self {
            name,
            intent,
            pattern: Regex::new(pattern).expect("valid classifier regex"),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// The classification table, in evaluation order.
pub fn rules() -> &'static Vec<ClassifierRule> {
    static RULES: OnceLock<Vec<ClassifierRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            // Query vocabulary first.
            ClassifierRule::new(
                "show-events-for",
                Intent::Query,
                r"(?i)\b(?:show|list|give|display|tell)\s+(?:me\s+)?(?:all\s+)?(?:the\s+)?(?:adverse\s+events|side\s+effects|reactions|reports)\s+(?:associated\s+with|related\s+to|for|of|about)\s+(?P<term>.+)",
            ),
            ClassifierRule::new(
                "what-events-for",
                Intent::Query,
                r"(?i)\bwhat\s+(?:are\s+)?(?:the\s+)?(?:adverse\s+events|side\s+effects|reactions)\s+(?:are\s+)?(?:reported\s+)?(?:associated\s+with|related\s+to|for|of|from|with)\s+(?P<term>.+)",
            ),
            ClassifierRule::new(
                "is-drug-safe",
                Intent::Query,
                r"(?i)\bis\s+(?P<term>.+?)\s+(?:safe|dangerous|harmful|risky)\b",
            ),
            ClassifierRule::new(
                "does-drug-cause",
                Intent::Query,
                r"(?i)\bdoes\s+(?P<term>.+?)\s+(?:cause|have|trigger|produce)\b",
            ),
            ClassifierRule::new(
                "effects-of",
                Intent::Query,
                r"(?i)\b(?:side\s+effects|adverse\s+events|reactions|reports)\s+(?:of|for|to|on|about)\s+(?P<term>.+)",
            ),
            ClassifierRule::new(
                "any-reports-on",
                Intent::Query,
                r"(?i)\b(?:any\s+)?(?:reports|information|data|complaints)\s+(?:on|about|regarding)\s+(?P<term>.+)",
            ),
            // Report vocabulary.
            ClassifierRule::new(
                "want-to-report",
                Intent::Report,
                r"(?i)\b(?:i\s+(?:want|need|would\s+like)\s+to\s+)?report\s+(?:an?\s+)?(?:adverse\s+event|side\s+effect|reaction|problem)\b",
            ),
            ClassifierRule::new(
                "took-and-reacted",
                Intent::Report,
                r"(?i)\b(?:took|used)\s+.+\s+and\s+(?:experienced|felt|had|got)\b",
            ),
            ClassifierRule::new(
                "after-taking",
                Intent::Report,
                r"(?i)\bafter\s+taking\b",
            ),
            ClassifierRule::new(
                "experienced-symptom",
                Intent::Report,
                r"(?i)\bi\s+(?:experienced|suffered|developed)\b",
            ),
            ClassifierRule::new(
                "drug-gave-me",
                Intent::Report,
                r"(?i)\b(?:gave|caused)\s+me\b",
            ),
        ]
    })
}

/// Classifies one turn.
///
/// A pending report short-circuits to [`Intent::Report`]: once a report is
/// in progress the turn is assumed to supply a missing field, and ambiguous
/// phrasing must not derail the half-completed report.
pub fn classify(text: &str, has_pending_report: bool) -> Intent {
    if has_pending_report {
        return Intent::Report;
    }
    for rule in rules() {
        if rule.matches(text) {
            return rule.intent;
        }
    }
    Intent::Query
}

/// The lookup term of a query turn: a rule's `term` capture, falling back to
/// a known drug name mentioned anywhere in the text.
pub fn query_term(text: &str) -> Option<String> {
    for rule in rules() {
        if rule.intent != Intent::Query {
            continue;
        }
        if let Some(term) = rule
            .pattern
            .captures(text)
            .and_then(|caps| caps.name("term"))
        {
            let cleaned = clean_term(term.as_str());
            if !cleaned.is_empty() {
                return Some(cleaned);
            }
        }
    }
    find_known_drug(text)
}

fn clean_term(value: &str) -> String {
    let value = value
        .trim()
        .trim_matches(|c: char| matches!(c, '?' | '.' | '!' | ','))
        .trim();
    value
        .strip_prefix("the ")
        .unwrap_or(value)
        .trim()
        .to_string()
}
