//! Report accumulation and promotion.
//!
//! A [`PartialReport`] collects extracted slots across turns until all four
//! are resolved, then promotes to a [`NewReport`] for persistence. A
//! completed report never lingers in partial form.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::engine::extract::ExtractedFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

/// The four slots a finalized report must carry.
pub const SLOT_DRUG: &str = "drug name";
pub const SLOT_REACTION: &str = "reaction";
pub const SLOT_AGE: &str = "age";
pub const SLOT_GENDER: &str = "gender";

/// Accumulated free text plus whichever slots have been resolved so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialReport {
    /// One entry per turn, in arrival order. Appended, never replaced.
    pub raw_text: Vec<String>,
    pub drug: Option<String>,
    pub reaction: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

impl PartialReport {
    /// Folds a turn's extraction into the accumulated report.
    ///
    /// A newly extracted slot overwrites a previously set one (last mention
    /// wins: later turns are answers or corrections to a targeted prompt).
    /// Slots absent from `fields` keep their prior values.
    pub fn merge(&mut self, fields: ExtractedFields, new_text: &str) {
        let trimmed = new_text.trim();
        if !trimmed.is_empty() {
            self.raw_text.push(trimmed.to_string());
        }
        if fields.drug.is_some() {
            self.drug = fields.drug;
        }
        if fields.reaction.is_some() {
            self.reaction = fields.reaction;
        }
        if fields.age.is_some() {
            self.age = fields.age;
        }
        if fields.gender.is_some() {
            self.gender = fields.gender;
        }
    }

    /// Slots still unset, in prompt order.
    ///
    /// With `assume_unknown_gender` the gender slot never blocks; it is
    /// filled with `unknown` at finalization instead.
    pub fn missing_slots(&self, assume_unknown_gender: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.drug.is_none() {
            missing.push(SLOT_DRUG);
        }
        if self.reaction.is_none() {
            missing.push(SLOT_REACTION);
        }
        if self.age.is_none() {
            missing.push(SLOT_AGE);
        }
        if self.gender.is_none() && !assume_unknown_gender {
            missing.push(SLOT_GENDER);
        }
        missing
    }

    pub fn is_complete(&self, assume_unknown_gender: bool) -> bool {
        self.missing_slots(assume_unknown_gender).is_empty()
    }

    /// Promotes a complete accumulation to a persistable record.
    ///
    /// Returns the report unchanged as `Err` when slots are still missing so
    /// the caller can put it back into pending state.
    pub fn finalize(self, assume_unknown_gender: bool) -> Result<NewReport, PartialReport> {
        if !self.is_complete(assume_unknown_gender) {
            return Err(self);
        }
        let (Some(drug), Some(reaction), Some(age)) = (self.drug, self.reaction, self.age) else {
            unreachable!("is_complete guarantees drug, reaction and age are set");
        };
        Ok(NewReport {
            drug_name: normalize_drug_name(&drug),
            reaction: reaction.trim().to_string(),
            age,
            gender: self.gender.unwrap_or(Gender::Unknown),
        })
    }
}

/// A completed report, not yet owned by a record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub drug_name: String,
    pub reaction: String,
    pub age: u32,
    pub gender: Gender,
}

impl NewReport {
    /// Stamps the record with an identity and timestamp at persistence time.
    pub fn into_report(self) -> Report {
        Report {
            id: Uuid::new_v4(),
            drug_name: self.drug_name,
            reaction: self.reaction,
            age: self.age,
            gender: self.gender,
            reported_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A persisted adverse-event report. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub drug_name: String,
    pub reaction: String,
    pub age: u32,
    pub gender: Gender,
    #[serde(with = "time::serde::rfc3339")]
    pub reported_at: OffsetDateTime,
}

pub(crate) fn normalize_drug_name(value: &str) -> String {
    value.trim().trim_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(
        drug: Option<&str>,
        reaction: Option<&str>,
        age: Option<u32>,
        gender: Option<Gender>,
    ) -> ExtractedFields {
        ExtractedFields {
            drug: drug.map(str::to_string),
            reaction: reaction.map(str::to_string),
            age,
            gender,
        }
    }

    #[test]
    fn merge_appends_raw_text_in_arrival_order() {
        let mut partial = PartialReport::default();
        partial.merge(fields(Some("Aspirin"), None, None, None), "turn one");
        partial.merge(fields(None, None, Some(34), None), "turn two");

        assert_eq!(partial.raw_text, vec!["turn one", "turn two"]);
    }

    #[test]
    fn merge_last_mention_wins_per_slot() {
        let mut partial = PartialReport::default();
        partial.merge(fields(None, None, Some(30), None), "I am 30");
        partial.merge(fields(None, None, Some(45), None), "sorry, 45 actually");

        assert_eq!(partial.age, Some(45));
    }

    #[test]
    fn merge_keeps_prior_values_for_absent_slots() {
        let mut partial = PartialReport::default();
        partial.merge(
            fields(Some("ibuprofen"), Some("nausea"), None, None),
            "I took ibuprofen and felt nausea",
        );
        partial.merge(fields(None, None, Some(52), Some(Gender::Female)), "52, female");

        assert_eq!(partial.drug.as_deref(), Some("ibuprofen"));
        assert_eq!(partial.reaction.as_deref(), Some("nausea"));
        assert_eq!(partial.age, Some(52));
        assert_eq!(partial.gender, Some(Gender::Female));
    }

    #[test]
    fn missing_slots_names_unset_fields() {
        let mut partial = PartialReport::default();
        partial.merge(fields(Some("aspirin"), Some("headache"), None, None), "x");

        assert_eq!(partial.missing_slots(false), vec![SLOT_AGE, SLOT_GENDER]);
        assert!(!partial.is_complete(false));
    }

    #[test]
    fn gender_does_not_block_when_unknown_is_assumed() {
        let mut partial = PartialReport::default();
        partial.merge(fields(Some("aspirin"), Some("headache"), Some(34), None), "x");

        assert!(!partial.is_complete(false));
        assert!(partial.is_complete(true));

        let report = partial.finalize(true).expect("complete under policy");
        assert_eq!(report.gender, Gender::Unknown);
    }

    #[test]
    fn finalize_normalizes_drug_name() {
        let mut partial = PartialReport::default();
        partial.merge(
            fields(Some("  Aspirin. "), Some(" headache "), Some(34), Some(Gender::Male)),
            "x",
        );

        let report = partial.finalize(false).expect("complete");
        assert_eq!(report.drug_name, "aspirin");
        assert_eq!(report.reaction, "headache");
    }

    #[test]
    fn finalize_returns_incomplete_report_unchanged() {
        let mut partial = PartialReport::default();
        partial.merge(fields(Some("aspirin"), None, None, None), "turn");
        let before = partial.clone();

        let back = partial.finalize(false).expect_err("incomplete");
        assert_eq!(back, before);
    }
}
