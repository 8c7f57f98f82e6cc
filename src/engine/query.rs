//! Lookup of stored reports by drug term.

use std::sync::Arc;

use crate::engine::report::Report;
use crate::error::SafeWatchError;
use crate::store::RecordStore;

/// Display cap on returned matches. The true match count is reported
/// separately so callers can say "showing 5 of N".
pub const QUERY_DISPLAY_LIMIT: usize = 5;

/// Transient lookup result, never persisted.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Most recent matches first, at most [`QUERY_DISPLAY_LIMIT`].
    pub matches: Vec<Report>,
    /// Total matches found before display truncation.
    pub total: usize,
}

impl QueryResult {
    pub fn is_truncated(&self) -> bool {
        self.total > self.matches.len()
    }
}

pub struct QueryEngine {
    store: Arc<dyn RecordStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Looks up reports for a drug term.
    ///
    /// The term is trimmed and lowercased before hitting the store. An empty
    /// match set is a valid result, not an error.
    pub async fn query(&self, term: &str) -> Result<QueryResult, SafeWatchError> {
        let term = normalize_term(term);
        if term.is_empty() {
            return Ok(QueryResult {
                matches: Vec::new(),
                total: 0,
            });
        }

        let mut matches = self.store.find_by_drug(&term).await?;
        // Store order is insertion order; newest reports are most relevant.
        matches.reverse();
        let total = matches.len();
        matches.truncate(QUERY_DISPLAY_LIMIT);
        Ok(QueryResult { matches, total })
    }
}

pub(crate) fn normalize_term(term: &str) -> String {
    term.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::report::{Gender, NewReport};
    use crate::store::MemoryStore;

    fn sample(drug: &str, reaction: &str) -> NewReport {
        NewReport {
            drug_name: drug.to_string(),
            reaction: reaction.to_string(),
            age: 40,
            gender: Gender::Other,
        }
    }

    async fn engine_with(reports: Vec<NewReport>) -> QueryEngine {
        let store = Arc::new(MemoryStore::new());
        for report in reports {
            store.append(report).await.expect("append");
        }
        QueryEngine::new(store)
    }

    #[tokio::test]
    async fn term_is_normalized_before_lookup() {
        let engine = engine_with(vec![sample("aspirin", "headache")]).await;
        let result = engine.query("  ASPIRIN ").await.expect("query");
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn newest_matches_come_first() {
        let engine = engine_with(vec![
            sample("aspirin", "headache"),
            sample("aspirin", "nausea"),
        ])
        .await;

        let result = engine.query("aspirin").await.expect("query");
        assert_eq!(result.matches[0].reaction, "nausea");
        assert_eq!(result.matches[1].reaction, "headache");
    }

    #[tokio::test]
    async fn display_is_capped_but_total_is_true_count() {
        let reports = (0..7).map(|i| sample("aspirin", &format!("r{i}"))).collect();
        let engine = engine_with(reports).await;

        let result = engine.query("aspirin").await.expect("query");
        assert_eq!(result.matches.len(), QUERY_DISPLAY_LIMIT);
        assert_eq!(result.total, 7);
        assert!(result.is_truncated());
    }

    #[tokio::test]
    async fn empty_match_set_is_valid() {
        let engine = engine_with(vec![]).await;
        let result = engine.query("warfarin").await.expect("query");
        assert_eq!(result.total, 0);
        assert!(result.matches.is_empty());
        assert!(!result.is_truncated());
    }

    #[tokio::test]
    async fn query_is_idempotent_without_intervening_writes() {
        let engine = engine_with(vec![
            sample("aspirin", "headache"),
            sample("aspirin", "nausea"),
        ])
        .await;

        let first = engine.query("aspirin").await.expect("query");
        let second = engine.query("aspirin").await.expect("query");
        assert_eq!(first.total, second.total);
        assert_eq!(first.matches, second.matches);
    }
}
