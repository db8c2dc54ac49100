//! Status snapshot shared between the poll loop and API handlers.

use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::session::PipelineOutcome;
use crate::watcher::ActiveSession;

/// Lost sessions kept for display.
const MAX_LOST_SESSIONS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionStatus {
    pub filename: String,
    pub started_at: String,
}

/// A recording whose file disappeared mid-session and was never processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LostSession {
    pub filename: String,
    pub started_at: String,
    pub detected_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub is_recording: bool,
    pub remote_sink_enabled: bool,
    pub active_session: Option<ActiveSessionStatus>,
    /// Filenames whose convert/upload task is still running.
    pub in_flight: Vec<String>,
    pub processed_count: usize,
    /// Files classified as growing on the last tick.
    pub growing_files: usize,
    pub lost_sessions: Vec<LostSession>,
    pub last_outcome: Option<PipelineOutcome>,
}

/// Cheap-to-clone handle. Written only by the poll loop; reads never block
/// on I/O.
#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<PipelineStatus>>,
}

impl StatusHandle {
    pub fn new(remote_sink_enabled: bool) -> Self {
        let handle = Self::default();
        handle.write().remote_sink_enabled = remote_sink_enabled;
        handle
    }

    pub fn get(&self) -> PipelineStatus {
        self.read().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.read().is_recording
    }

    pub fn set_active(&self, active: Option<&ActiveSession>) {
        let mut status = self.write();
        status.is_recording = active.is_some();
        status.active_session = active.map(|session| ActiveSessionStatus {
            filename: session.filename.clone(),
            started_at: format_ms(session.started_at_ms),
        });
    }

    pub fn set_progress(&self, in_flight: Vec<String>, processed_count: usize, growing_files: usize) {
        let mut status = self.write();
        status.in_flight = in_flight;
        status.processed_count = processed_count;
        status.growing_files = growing_files;
    }

    pub fn record_lost(&self, filename: &str, started_at_ms: i64, detected_at_ms: i64) {
        let mut status = self.write();
        status.lost_sessions.push(LostSession {
            filename: filename.to_string(),
            started_at: format_ms(started_at_ms),
            detected_at: format_ms(detected_at_ms),
        });
        if status.lost_sessions.len() > MAX_LOST_SESSIONS {
            status.lost_sessions.remove(0);
        }
    }

    pub fn record_outcome(&self, outcome: PipelineOutcome) {
        self.write().last_outcome = Some(outcome);
    }

    fn read(&self) -> RwLockReadGuard<'_, PipelineStatus> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipelineStatus> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn format_ms(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
