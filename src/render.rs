//! Human-readable rendering of reports and JSON output.

use serde::Serialize;
use time::macros::format_description;

use crate::engine::report::Report;
use crate::error::SafeWatchError;

/// One-line summary of a stored report, the shape the chat surfaces show in
/// their `data` lists.
pub fn report_summary(report: &Report) -> String {
    let date_format = format_description!("[year]-[month]-[day]");
    let date = report
        .reported_at
        .format(&date_format)
        .unwrap_or_else(|_| report.reported_at.to_string());
    format!(
        "Report {}: {} (drug: {}, age {}, {}, {})",
        report.id.simple(),
        report.reaction,
        report.drug_name,
        report.age,
        report.gender.as_str(),
        date
    )
}

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, SafeWatchError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::report::{Gender, NewReport};

    #[test]
    fn report_summary_includes_every_slot() {
        let report = NewReport {
            drug_name: "aspirin".to_string(),
            reaction: "headache".to_string(),
            age: 34,
            gender: Gender::Male,
        }
        .into_report();

        let summary = report_summary(&report);
        assert!(summary.starts_with(&format!("Report {}", report.id.simple())));
        assert!(summary.contains("headache"));
        assert!(summary.contains("aspirin"));
        assert!(summary.contains("age 34"));
        assert!(summary.contains("male"));
    }

    #[test]
    fn to_pretty_serializes_with_indentation() {
        #[derive(Serialize)]
        struct Demo<'a> {
            drug: &'a str,
            age: u32,
        }

        let json = to_pretty(&Demo {
            drug: "aspirin",
            age: 34,
        })
        .expect("json");
        assert!(json.contains('\n'));
        assert!(json.contains("\"drug\": \"aspirin\""));
        assert!(json.contains("\"age\": 34"));
    }
}
