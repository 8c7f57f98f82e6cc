//! Record stores: append-only persistence of completed reports.

use async_trait::async_trait;

use crate::engine::report::{NewReport, Report};
use crate::error::SafeWatchError;

pub(crate) mod json_file;
pub(crate) mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Collaborator boundary for report persistence.
///
/// `append` is atomic per call: either the full report is recorded or
/// nothing is. Reports are immutable once stored.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a completed report, assigning its id and timestamp.
    async fn append(&self, report: NewReport) -> Result<Report, SafeWatchError>;

    /// Reports whose drug name contains `name`, case-insensitively, in
    /// insertion order.
    async fn find_by_drug(&self, name: &str) -> Result<Vec<Report>, SafeWatchError>;
}

pub(crate) fn drug_name_matches(candidate: &str, query: &str) -> bool {
    let candidate = candidate.trim().to_ascii_lowercase();
    let query = query.trim().to_ascii_lowercase();
    !candidate.is_empty() && !query.is_empty() && candidate.contains(&query)
}

/// Default on-disk location of the report file.
pub fn default_data_file() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("safewatch")
        .join("adverse_events.json")
}

#[cfg(test)]
mod tests {
    use super::drug_name_matches;

    #[test]
    fn matching_is_case_insensitive_substring() {
        assert!(drug_name_matches("aspirin", "ASPIRIN"));
        assert!(drug_name_matches("acetylsalicylic acid (aspirin)", "aspirin"));
        assert!(!drug_name_matches("metformin", "aspirin"));
    }

    #[test]
    fn empty_terms_never_match() {
        assert!(!drug_name_matches("", "aspirin"));
        assert!(!drug_name_matches("aspirin", "  "));
    }
}
