//! Pipeline orchestrator.
//!
//! Owns the detector state, the processed ledger and the handles of
//! in-flight session tasks. Everything here runs on the poll loop; the
//! spawned tasks only see the job they were given.

use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ledger::ProcessedLedger;
use super::session::{PipelineOutcome, RecordingJob, SessionPipeline};
use super::status::StatusHandle;
use crate::watcher::{detector, DetectorEvent, DetectorState, RecordingFileInfo, SnapshotReader};

struct InFlightSession {
    filename: String,
    handle: JoinHandle<PipelineOutcome>,
}

pub struct Orchestrator {
    reader: SnapshotReader,
    growth_window: Duration,
    state: DetectorState,
    ledger: ProcessedLedger,
    pipeline: SessionPipeline,
    in_flight: Vec<InFlightSession>,
    growing_files: usize,
    status: StatusHandle,
}

impl Orchestrator {
    pub fn new(
        reader: SnapshotReader,
        growth_window: Duration,
        ledger: ProcessedLedger,
        pipeline: SessionPipeline,
        status: StatusHandle,
    ) -> Self {
        Self {
            reader,
            growth_window,
            state: DetectorState::Idle,
            ledger,
            pipeline,
            in_flight: Vec::new(),
            growing_files: 0,
            status,
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &self.ledger
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// One poll tick: snapshot, detect, reap finished tasks, publish status.
    pub async fn tick(&mut self) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        match self.reader.read() {
            Ok(snapshot) => {
                self.observe(&snapshot, now_ms);
            }
            // No transition on a failed read: an unreadable directory must
            // not look like a recording that stopped.
            Err(e) => warn!("[RECORD] Skipping tick, cannot read {:?}: {:#}", self.reader.dir(), e),
        }
        self.reap_finished().await;
        self.publish_status();
    }

    /// Apply one snapshot and commit the resulting transition.
    ///
    /// Returns the event that was acted on. A stop for a recording already in
    /// the ledger is swallowed and yields `None`.
    pub fn observe(&mut self, snapshot: &[RecordingFileInfo], now_ms: i64) -> Option<DetectorEvent> {
        let observation = detector::observe(&self.state, snapshot, now_ms, self.growth_window);

        if observation.growing > 1 && observation.growing != self.growing_files {
            warn!(
                "[RECORD] {} files are growing at once; only one session is tracked",
                observation.growing
            );
        }
        self.growing_files = observation.growing;
        self.state = observation.next;

        let committed = match observation.event {
            Some(DetectorEvent::SessionStarted { filename }) => {
                info!("[RECORD] Started: {}", filename);
                Some(DetectorEvent::SessionStarted { filename })
            }
            Some(DetectorEvent::SessionStopped { filename, path }) => {
                if self.launch(&filename, &path) {
                    Some(DetectorEvent::SessionStopped { filename, path })
                } else {
                    None
                }
            }
            Some(DetectorEvent::SessionLost {
                filename,
                started_at_ms,
            }) => {
                error!(
                    target: "recwatch::lost_session",
                    "[RECORD] Session for {} ended but the file is gone from {:?}; \
                     the recording was NOT processed",
                    filename,
                    self.reader.dir()
                );
                self.status.record_lost(&filename, started_at_ms, now_ms);
                Some(DetectorEvent::SessionLost {
                    filename,
                    started_at_ms,
                })
            }
            None => None,
        };

        self.publish_status();
        committed
    }

    /// Ledger check, ledger commit, then spawn convert → upload.
    fn launch(&mut self, filename: &str, path: &Path) -> bool {
        if self.ledger.contains(filename) {
            debug!("[RECORD] {} already processed, ignoring stop", filename);
            return false;
        }
        self.ledger.insert(filename, path);

        info!("[RECORD] Stopped: {}", filename);

        let pipeline = self.pipeline.clone();
        let job = RecordingJob {
            filename: filename.to_string(),
            path: path.to_path_buf(),
        };
        let handle = tokio::spawn(async move { pipeline.run(job).await });

        self.in_flight.push(InFlightSession {
            filename: filename.to_string(),
            handle,
        });
        true
    }

    async fn reap_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|session| session.handle.is_finished());
        self.in_flight = running;

        for session in finished {
            self.record_join(session.filename, session.handle.await);
        }
    }

    fn record_join(
        &self,
        filename: String,
        result: Result<PipelineOutcome, tokio::task::JoinError>,
    ) -> Option<PipelineOutcome> {
        match result {
            Ok(outcome) => {
                self.status.record_outcome(outcome.clone());
                Some(outcome)
            }
            Err(e) => {
                error!("[PIPELINE] Task for {} did not complete: {}", filename, e);
                None
            }
        }
    }

    fn publish_status(&self) {
        self.status.set_active(self.state.active());
        self.status.set_progress(
            self.in_flight.iter().map(|s| s.filename.clone()).collect(),
            self.ledger.len(),
            self.growing_files,
        );
    }

    /// Wait up to `grace` for in-flight sessions; abort whatever is left.
    pub async fn drain(&mut self, grace: Duration) -> Vec<PipelineOutcome> {
        if self.in_flight.is_empty() {
            return Vec::new();
        }

        info!(
            "[PIPELINE] Waiting up to {}s for {} in-flight session(s)",
            grace.as_secs(),
            self.in_flight.len()
        );

        let deadline = tokio::time::Instant::now() + grace;
        let mut outcomes = Vec::new();
        for mut session in std::mem::take(&mut self.in_flight) {
            match tokio::time::timeout_at(deadline, &mut session.handle).await {
                Ok(result) => outcomes.extend(self.record_join(session.filename, result)),
                Err(_) => {
                    // Dropping the task kills a still-running ffmpeg (kill_on_drop).
                    warn!(
                        "[PIPELINE] {} still running at shutdown, aborting",
                        session.filename
                    );
                    session.handle.abort();
                }
            }
        }

        self.publish_status();
        outcomes
    }

    pub async fn shutdown(mut self, grace: Duration) {
        self.drain(grace).await;
    }
}
