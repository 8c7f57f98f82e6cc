//! Session-scoped pending-report state.
//!
//! The tracker is the single source of truth for what has been accumulated
//! so far: callers pass an opaque session id with each turn instead of
//! re-concatenating text client-side. Each session maps to its own locked
//! slot; the engine holds that lock for the duration of a turn so a retried
//! request for the same session cannot lose an update. Different sessions
//! proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::engine::report::PartialReport;

/// Session id used when the caller does not supply one.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Default)]
pub struct SessionState {
    pending: Option<PartialReport>,
}

impl SessionState {
    pub fn pending(&self) -> Option<&PartialReport> {
        self.pending.as_ref()
    }

    /// Replaces (not merges) the stored pending report.
    pub fn set_pending(&mut self, report: PartialReport) {
        self.pending = Some(report);
    }

    /// Takes the pending report out, leaving the session empty.
    pub fn take_pending(&mut self) -> Option<PartialReport> {
        self.pending.take()
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session's slot, creating it on first use.
    ///
    /// The caller locks the returned slot and holds that lock across the
    /// whole turn; the tracker-wide map lock is only held long enough to
    /// look the slot up.
    pub async fn slot(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    pub async fn get_pending(&self, session_id: &str) -> Option<PartialReport> {
        let slot = self.slot(session_id).await;
        let state = slot.lock().await;
        state.pending().cloned()
    }

    pub async fn set_pending(&self, session_id: &str, report: PartialReport) {
        let slot = self.slot(session_id).await;
        let mut state = slot.lock().await;
        state.set_pending(report);
    }

    pub async fn clear_pending(&self, session_id: &str) {
        let slot = self.slot(session_id).await;
        let mut state = slot.lock().await;
        state.clear_pending();
    }
}
