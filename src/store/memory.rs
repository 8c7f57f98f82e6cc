//! In-memory record store for tests and ephemeral runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::engine::report::{NewReport, Report};
use crate::error::SafeWatchError;
use crate::store::{RecordStore, drug_name_matches};

#[derive(Debug, Default)]
pub struct MemoryStore {
    reports: Mutex<Vec<Report>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored, in insertion order.
    pub async fn all(&self) -> Vec<Report> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, report: NewReport) -> Result<Report, SafeWatchError> {
        let report = report.into_report();
        let mut reports = self.reports.lock().await;
        reports.push(report.clone());
        Ok(report)
    }

    async fn find_by_drug(&self, name: &str) -> Result<Vec<Report>, SafeWatchError> {
        let reports = self.reports.lock().await;
        Ok(reports
            .iter()
            .filter(|r| drug_name_matches(&r.drug_name, name))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::report::Gender;

    fn sample(drug: &str) -> NewReport {
        NewReport {
            drug_name: drug.to_string(),
            reaction: "headache".to_string(),
            age: 34,
            gender: Gender::Male,
        }
    }

    #[tokio::test]
    async fn append_assigns_identity_and_timestamp() {
        let store = MemoryStore::new();
        let a = store.append(sample("aspirin")).await.expect("append");
        let b = store.append(sample("aspirin")).await.expect("append");
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn find_by_drug_is_case_insensitive_substring() {
        let store = MemoryStore::new();
        store.append(sample("aspirin")).await.expect("append");
        store.append(sample("metformin")).await.expect("append");

        let matches = store.find_by_drug("ASPIRIN").await.expect("find");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].drug_name, "aspirin");

        let matches = store.find_by_drug("aspi").await.expect("find");
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn find_by_drug_empty_result_is_not_an_error() {
        let store = MemoryStore::new();
        let matches = store.find_by_drug("warfarin").await.expect("find");
        assert!(matches.is_empty());
    }
}
