//! Field extraction from a single turn's text.
//!
//! Pure pattern matching over the four report slots. Absence of a match
//! leaves a slot unset; nothing here fabricates a value or errors on
//! malformed input.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::report::Gender;

/// Any subset of the four slots recovered from one text span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub drug: Option<String>,
    pub reaction: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

/// Accepted human-age range. Out-of-range integers are ignored, not clamped.
const AGE_MIN_EXCLUSIVE: u32 = 0;
const AGE_MAX_EXCLUSIVE: u32 = 130;

/// Drug names recognized without reporting vocabulary around them.
const KNOWN_DRUGS: &[&str] = &[
    "aspirin",
    "ibuprofen",
    "paracetamol",
    "acetaminophen",
    "metformin",
    "amoxicillin",
    "penicillin",
    "lisinopril",
    "atorvastatin",
    "omeprazole",
    "insulin",
    "warfarin",
    "prednisone",
    "sertraline",
];

/// Reactions recognized as standalone mentions, mostly follow-up answers.
const KNOWN_REACTIONS: &[&str] = &[
    "headache",
    "nausea",
    "dizziness",
    "rash",
    "fever",
    "vomiting",
    "fatigue",
    "insomnia",
    "swelling",
    "itching",
    "diarrhea",
    "drowsiness",
];

/// Dose-style tokens that disqualify a bare integer from being read as an age.
const DOSE_UNITS: &[&str] = &[
    "mg", "mcg", "g", "ml", "tablet", "tablets", "pill", "pills", "capsule", "capsules", "doses",
    "dose",
];

fn drug_reaction_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)took\s+(?P<drug>.+?)\s+and\s+(?:experienced|felt|had|got)\s+(?P<reaction>.+)",
            r"(?i)after\s+taking\s+(?P<drug>.+?)\s*,?\s*i\s+(?:had|felt|got|experienced)\s+(?P<reaction>.+)",
            r"(?i)(?:i\s+)?(?:had|got|experienced)\s+(?:an?\s+)?(?P<reaction>.+?)\s+after\s+taking\s+(?P<drug>.+)",
            r"(?i)used\s+(?P<drug>.+?)\s+and\s+(?:got|had|felt)\s+(?P<reaction>.+)",
            r"(?i)(?P<drug>\S+)\s+(?:gave|caused)\s+me\s+(?:an?\s+)?(?P<reaction>.+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid drug/reaction regex"))
        .collect()
    })
}

fn age_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(?P<age>\d{1,3})[-\s]*(?:years?|yrs?|yo)(?:[-\s]*old)?\b",
            r"(?i)\bage\s*(?:is|:|of)?\s*(?P<age>\d{1,3})\b",
            r"(?i)\bi\s*(?:am|'m)\s+(?P<age>\d{1,3})\b",
            r"\((?P<age>\d{1,3})\)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid age regex"))
        .collect()
    })
}

fn bare_integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,3})\b(\s*\w*)").expect("valid regex"))
}

fn known_drug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives = KNOWN_DRUGS.join("|");
        Regex::new(&format!(r"(?i)\b(?P<drug>{alternatives})\b")).expect("valid drug vocab regex")
    })
}

fn known_reaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives = KNOWN_REACTIONS.join("|");
        Regex::new(&format!(r"(?i)\b(?P<reaction>{alternatives})\b"))
            .expect("valid reaction vocab regex")
    })
}

fn gender_res() -> &'static Vec<(Regex, Gender)> {
    static RES: OnceLock<Vec<(Regex, Gender)>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            (
                Regex::new(r"(?i)\b(female|woman|girl)\b").expect("valid regex"),
                Gender::Female,
            ),
            (
                Regex::new(r"(?i)\b(male|man|boy)\b").expect("valid regex"),
                Gender::Male,
            ),
            (
                Regex::new(r"(?i)\bnon[-\s]?binary\b").expect("valid regex"),
                Gender::Other,
            ),
        ]
    })
}

/// Scans one text span for the four slots. Pure; any subset may come back.
pub fn extract(text: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::default();

    for pattern in drug_reaction_patterns() {
        if let Some(caps) = pattern.captures(text) {
            fields.drug = caps.name("drug").map(|m| clean_capture(m.as_str()));
            fields.reaction = caps.name("reaction").map(|m| clean_capture(m.as_str()));
            break;
        }
    }

    // Known-vocabulary fallbacks catch bare mentions ("it was aspirin",
    // a follow-up "rash" with no reporting verb around it).
    if fields.drug.is_none() {
        fields.drug = known_drug_re()
            .captures(text)
            .and_then(|caps| caps.name("drug"))
            .map(|m| clean_capture(m.as_str()));
    }
    if fields.reaction.is_none() {
        fields.reaction = known_reaction_re()
            .captures(text)
            .and_then(|caps| caps.name("reaction"))
            .map(|m| clean_capture(m.as_str()));
    }

    fields.age = extract_age(text);

    for (re, gender) in gender_res() {
        if re.is_match(text) {
            fields.gender = Some(*gender);
            break;
        }
    }

    fields
}

/// A known drug name mentioned anywhere in the text, if any.
pub(crate) fn find_known_drug(text: &str) -> Option<String> {
    known_drug_re()
        .captures(text)
        .and_then(|caps| caps.name("drug"))
        .map(|m| clean_capture(m.as_str()))
}

fn extract_age(text: &str) -> Option<u32> {
    for pattern in age_patterns() {
        if let Some(age) = pattern
            .captures(text)
            .and_then(|caps| caps.name("age"))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return plausible_age(age);
        }
    }

    // Bare integer fallback for terse follow-ups like "34, male". Integers
    // that read as a dose or quantity ("took 2 aspirin") are skipped.
    for caps in bare_integer_re().captures_iter(text) {
        let Some(age) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
            continue;
        };
        let following = caps
            .get(2)
            .map(|m| m.as_str().trim().to_ascii_lowercase())
            .unwrap_or_default();
        if DOSE_UNITS.contains(&following.as_str())
            || KNOWN_DRUGS.contains(&following.as_str())
        {
            continue;
        }
        if let Some(age) = plausible_age(age) {
            return Some(age);
        }
    }

    None
}

fn plausible_age(age: u32) -> Option<u32> {
    (age > AGE_MIN_EXCLUSIVE && age < AGE_MAX_EXCLUSIVE).then_some(age)
}

fn clean_capture(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '?' | '.' | '!' | ','))
        .trim()
        .to_string()
}
