//! The conversational report/query engine.
//!
//! Each turn is an independent request/response unit: the session's prior
//! pending report (if any) is looked up, the turn is classified as a report
//! contribution or a lookup query, and the branch either accumulates toward
//! a persistable report or answers from the record store. No error escapes
//! a turn; every turn yields a well-formed [`ChatResponse`].

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SafeWatchError;
use crate::render;
use crate::sources::openfda::OpenFdaClient;
use crate::store::RecordStore;

pub(crate) mod extract;
pub(crate) mod intent;
pub(crate) mod query;
pub(crate) mod report;
pub(crate) mod session;

pub use intent::Intent;
pub use query::{QUERY_DISPLAY_LIMIT, QueryEngine, QueryResult};
pub use report::{Gender, NewReport, PartialReport, Report};
pub use session::{DEFAULT_SESSION, SessionTracker};

use session::SessionState;

/// Engine-wide policy switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// When set, an unresolved gender no longer blocks completion; it is
    /// recorded as `unknown` at finalization. Off by default: the engine
    /// keeps prompting instead of guessing.
    pub assume_unknown_gender: bool,
    /// When set, queries with no locally stored matches fall back to an
    /// OpenFDA FAERS lookup.
    pub remote_lookup: bool,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            assume_unknown_gender: env_flag("SAFEWATCH_ASSUME_UNKNOWN_GENDER"),
            remote_lookup: env_flag("SAFEWATCH_REMOTE_LOOKUP"),
        }
    }
}

fn env_flag(var: &str) -> bool {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

/// One incoming chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Opaque conversation identity supplied by the caller. Turns without
    /// one share a single default session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// One turn's reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// Present on the query path: truncated human-readable match summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
    /// True when a report was persisted this turn.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub report_saved: bool,
    /// True when the engine is still accumulating and needs more fields.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing_info: bool,
}

impl ChatResponse {
    fn plain(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }
}

pub struct ChatEngine {
    config: EngineConfig,
    tracker: SessionTracker,
    store: Arc<dyn RecordStore>,
    query: QueryEngine,
    openfda: Option<OpenFdaClient>,
}

impl ChatEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Result<Self, SafeWatchError> {
        let openfda = if config.remote_lookup {
            Some(OpenFdaClient::new()?)
        } else {
            None
        };
        Ok(Self {
            config,
            tracker: SessionTracker::new(),
            query: QueryEngine::new(store.clone()),
            store,
            openfda,
        })
    }

    /// Processes one turn. Holds the session's slot lock throughout, so a
    /// retried request for the same session cannot race this one.
    pub async fn handle_turn(&self, request: &ChatRequest) -> ChatResponse {
        let message = request.message.trim();
        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SESSION);

        if message.is_empty() {
            return ChatResponse::plain("Please say something!");
        }

        let slot = self.tracker.slot(session_id).await;
        let mut state = slot.lock().await;

        let has_pending = state.pending().is_some();
        if has_pending && is_cancel(message) {
            state.clear_pending();
            return ChatResponse::plain("Okay, I've discarded that report.");
        }

        debug!(session = session_id, has_pending, "Handling turn");
        match intent::classify(message, has_pending) {
            Intent::Report => self.report_turn(&mut state, message).await,
            Intent::Query => {
                // A query turn never carries a pending report (the pending
                // short-circuit wins), but clearing keeps the invariant
                // local instead of relying on the classifier.
                state.clear_pending();
                self.query_turn(message).await
            }
        }
    }

    async fn report_turn(&self, state: &mut SessionState, message: &str) -> ChatResponse {
        let mut partial = state.take_pending().unwrap_or_default();
        // Delta extraction: only this turn's text is scanned, so a targeted
        // answer cannot be overwritten by re-reading earlier turns.
        let fields = extract::extract(message);
        partial.merge(fields, message);

        match partial.clone().finalize(self.config.assume_unknown_gender) {
            Err(_incomplete) => {
                let missing = partial.missing_slots(self.config.assume_unknown_gender);
                let prompt = format!(
                    "I need a few more details to complete the report. Could you tell me the patient's {}?",
                    join_names(&missing)
                );
                state.set_pending(partial);
                ChatResponse {
                    response: prompt,
                    missing_info: true,
                    ..ChatResponse::default()
                }
            }
            Ok(new_report) => match self.store.append(new_report).await {
                Ok(saved) => {
                    debug!(report_id = %saved.id, drug = %saved.drug_name, "Report persisted");
                    ChatResponse {
                        response: format!(
                            "I detected a potential adverse event and saved it.\nDrug: {}\nReaction: {}\nAge: {}\nGender: {}",
                            saved.drug_name,
                            saved.reaction,
                            saved.age,
                            saved.gender.as_str()
                        ),
                        report_saved: true,
                        ..ChatResponse::default()
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Report persistence failed, keeping pending state");
                    // The accumulated report stays pending so the next turn
                    // can retry without re-entering every field.
                    state.set_pending(partial);
                    ChatResponse::plain(
                        "I couldn't save your report right now. Please try again in a moment.",
                    )
                }
            },
        }
    }

    async fn query_turn(&self, message: &str) -> ChatResponse {
        let Some(term) = intent::query_term(message) else {
            return ChatResponse::plain(
                "I didn't quite catch that. Try asking 'What are the side effects of [drug]?' or tell me 'I took [drug] and felt [symptom]'.",
            );
        };
        let term = query::normalize_term(&term);

        let result = match self.query.query(&term).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, term, "Record store lookup failed");
                return ChatResponse::plain(
                    "Sorry, I couldn't look that up right now. Please try again.",
                );
            }
        };

        if result.total > 0 {
            let data: Vec<String> = result.matches.iter().map(render::report_summary).collect();
            let response = if result.is_truncated() {
                format!(
                    "Found {} reports for {term}. Showing the {} most recent.",
                    result.total,
                    data.len()
                )
            } else if result.total == 1 {
                format!("Found 1 report for {term}.")
            } else {
                format!("Found {} reports for {term}.", result.total)
            };
            return ChatResponse {
                response,
                data: Some(data),
                ..ChatResponse::default()
            };
        }

        if let Some(openfda) = &self.openfda {
            match openfda.recent_summaries(&term, QUERY_DISPLAY_LIMIT).await {
                Ok(summaries) if !summaries.is_empty() => {
                    return ChatResponse {
                        response: format!(
                            "I have no local reports for {term}, but OpenFDA lists {} recent reports.",
                            summaries.len()
                        ),
                        data: Some(summaries),
                        ..ChatResponse::default()
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    // Remote lookup is best-effort; degrade to "none found".
                    warn!(error = %err, term, "OpenFDA fallback failed");
                }
            }
        }

        ChatResponse::plain(format!(
            "I couldn't find any adverse event reports for '{term}' right now."
        ))
    }
}

fn is_cancel(message: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:cancel|never\s?mind|forget\s+it|discard\s+(?:it|that|the\s+report))\s*[.!]*\s*$")
            .expect("valid cancel regex")
    });
    re.is_match(message)
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => (*only).to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
