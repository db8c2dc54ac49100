//! Session detector.
//!
//! The recorder gives no signal when it starts or finishes a file, so
//! sessions are inferred from modification times:
//!
//! - `Idle` + a growing file → `Recording`, emits `SessionStarted`
//! - `Recording` + active file no longer growing → `Idle`, emits
//!   `SessionStopped` (or `SessionLost` when the active file is gone from the
//!   snapshot). A newer growing file is picked up on the following tick.
//!
//! `observe` is a pure function of the previous state, the snapshot and the
//! current time, so it can be driven without timers or a filesystem.

use std::path::PathBuf;
use std::time::Duration;

use super::snapshot::RecordingFileInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub filename: String,
    pub started_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DetectorState {
    #[default]
    Idle,
    Recording(ActiveSession),
}

impl DetectorState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording(_))
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            Self::Recording(session) => Some(session),
            Self::Idle => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorEvent {
    SessionStarted {
        filename: String,
    },
    SessionStopped {
        filename: String,
        path: PathBuf,
    },
    /// The active file vanished before it stopped growing.
    SessionLost {
        filename: String,
        started_at_ms: i64,
    },
}

/// Result of observing one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub next: DetectorState,
    pub event: Option<DetectorEvent>,
    /// Number of files classified as growing on this tick.
    pub growing: usize,
}

pub fn is_growing(file: &RecordingFileInfo, now_ms: i64, growth_window: Duration) -> bool {
    let window_ms = i64::try_from(growth_window.as_millis()).unwrap_or(i64::MAX);
    file.size_bytes > 0 && now_ms.saturating_sub(file.modified_at_ms) < window_ms
}

pub fn observe(
    state: &DetectorState,
    snapshot: &[RecordingFileInfo],
    now_ms: i64,
    growth_window: Duration,
) -> Observation {
    let mut growing = snapshot
        .iter()
        .filter(|file| is_growing(file, now_ms, growth_window));
    // First in listing order wins when several files grow at once.
    let candidate = growing.next();
    let growing_count = candidate.map(|_| 1 + growing.count()).unwrap_or(0);

    let (next, event) = match state {
        DetectorState::Idle => match candidate {
            Some(file) => (
                DetectorState::Recording(ActiveSession {
                    filename: file.name.clone(),
                    started_at_ms: now_ms,
                }),
                Some(DetectorEvent::SessionStarted {
                    filename: file.name.clone(),
                }),
            ),
            None => (DetectorState::Idle, None),
        },
        // The session ends as soon as its own file stops growing, even if the
        // recorder has already moved on to the next file.
        DetectorState::Recording(active) => {
            match snapshot.iter().find(|file| file.name == active.filename) {
                Some(file) if is_growing(file, now_ms, growth_window) => (state.clone(), None),
                Some(file) => (
                    DetectorState::Idle,
                    Some(DetectorEvent::SessionStopped {
                        filename: file.name.clone(),
                        path: file.path.clone(),
                    }),
                ),
                None => (
                    DetectorState::Idle,
                    Some(DetectorEvent::SessionLost {
                        filename: active.filename.clone(),
                        started_at_ms: active.started_at_ms,
                    }),
                ),
            }
        }
    };

    Observation {
        next,
        event,
        growing: growing_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    fn file(name: &str, size_bytes: u64, modified_at_ms: i64) -> RecordingFileInfo {
        RecordingFileInfo {
            name: name.to_string(),
            path: PathBuf::from("/var/recordings").join(name),
            size_bytes,
            modified_at_ms,
        }
    }

    #[test]
    fn test_growth_classification() {
        let now = 100_000;
        assert!(is_growing(&file("a.flv", 10, now), now, WINDOW));
        assert!(is_growing(&file("a.flv", 10, now - 4_999), now, WINDOW));
        assert!(!is_growing(&file("a.flv", 10, now - 5_000), now, WINDOW));
        assert!(!is_growing(&file("a.flv", 0, now), now, WINDOW));
    }

    #[test]
    fn test_empty_file_does_not_start_session() {
        let obs = observe(&DetectorState::Idle, &[file("rec1.flv", 0, 0)], 0, WINDOW);
        assert_eq!(obs.next, DetectorState::Idle);
        assert!(obs.event.is_none());
        assert_eq!(obs.growing, 0);
    }

    #[test]
    fn test_start_then_stop_scenario() {
        // t=0: empty file, t=2s: growing, t=4s+: stale
        let t0 = 1_000_000;
        let obs = observe(&DetectorState::Idle, &[file("rec1.flv", 0, t0)], t0, WINDOW);
        assert!(obs.event.is_none());

        let t2 = t0 + 2_000;
        let obs = observe(&obs.next, &[file("rec1.flv", 500_000, t2)], t2, WINDOW);
        assert_eq!(
            obs.event,
            Some(DetectorEvent::SessionStarted {
                filename: "rec1.flv".to_string()
            })
        );
        assert!(obs.next.is_recording());

        let t4 = t2 + WINDOW.as_millis() as i64 + 2_000;
        let obs = observe(&obs.next, &[file("rec1.flv", 500_000, t2)], t4, WINDOW);
        assert_eq!(
            obs.event,
            Some(DetectorEvent::SessionStopped {
                filename: "rec1.flv".to_string(),
                path: PathBuf::from("/var/recordings/rec1.flv"),
            })
        );
        assert_eq!(obs.next, DetectorState::Idle);
    }

    #[test]
    fn test_single_start_and_single_stop_over_many_ticks() {
        let mut state = DetectorState::Idle;
        let mut events = Vec::new();
        let mut mtime = 0;

        for tick in 0..20 {
            let now = tick * 3_000;
            // Recorder writes during ticks 1..=10
            if (1..=10).contains(&tick) {
                mtime = now;
            }
            let snapshot = [file("rec.flv", 1 + mtime as u64, mtime)];
            let obs = observe(&state, &snapshot, now, WINDOW);
            state = obs.next;
            events.extend(obs.event);
        }

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DetectorEvent::SessionStarted { .. }));
        assert!(matches!(events[1], DetectorEvent::SessionStopped { .. }));
    }

    #[test]
    fn test_recording_continues_while_growing() {
        let state = DetectorState::Recording(ActiveSession {
            filename: "rec1.flv".to_string(),
            started_at_ms: 0,
        });
        let obs = observe(&state, &[file("rec1.flv", 10, 9_000)], 10_000, WINDOW);
        assert_eq!(obs.next, state);
        assert!(obs.event.is_none());
    }

    #[test]
    fn test_lost_session_when_file_disappears() {
        let state = DetectorState::Recording(ActiveSession {
            filename: "rec1.flv".to_string(),
            started_at_ms: 42,
        });
        let obs = observe(&state, &[file("other.flv", 10, 0)], 60_000, WINDOW);
        assert_eq!(obs.next, DetectorState::Idle);
        assert_eq!(
            obs.event,
            Some(DetectorEvent::SessionLost {
                filename: "rec1.flv".to_string(),
                started_at_ms: 42,
            })
        );
    }

    #[test]
    fn test_back_to_back_sessions_are_both_detected() {
        // rec1 written until t=10s, rec2 appears at t=14s and is written
        // until t=40s; one tick every 3s.
        let mut state = DetectorState::Idle;
        let mut events = Vec::new();

        for tick in 0..20 {
            let now = tick * 3_000;
            let mut snapshot = vec![file("rec1.flv", 1, now.min(10_000))];
            if now >= 14_000 {
                snapshot.push(file("rec2.flv", 1, now.min(40_000)));
            }
            let obs = observe(&state, &snapshot, now, WINDOW);
            state = obs.next;
            events.extend(obs.event.map(|event| (now, event)));
        }

        let started = |name: &str| DetectorEvent::SessionStarted {
            filename: name.to_string(),
        };
        let stopped = |name: &str| DetectorEvent::SessionStopped {
            filename: name.to_string(),
            path: PathBuf::from("/var/recordings").join(name),
        };
        assert_eq!(
            events,
            vec![
                (0, started("rec1.flv")),
                (15_000, stopped("rec1.flv")),
                (18_000, started("rec2.flv")),
                (45_000, stopped("rec2.flv")),
            ]
        );
        assert_eq!(state, DetectorState::Idle);
    }

    #[test]
    fn test_active_file_still_growing_keeps_session_when_another_grows() {
        let state = DetectorState::Recording(ActiveSession {
            filename: "b.flv".to_string(),
            started_at_ms: 0,
        });
        let now = 10_000;
        let snapshot = [file("a.flv", 10, now), file("b.flv", 10, now)];
        let obs = observe(&state, &snapshot, now, WINDOW);
        assert_eq!(obs.next, state);
        assert!(obs.event.is_none());
        assert_eq!(obs.growing, 2);
    }

    #[test]
    fn test_lost_session_while_next_file_grows() {
        let state = DetectorState::Recording(ActiveSession {
            filename: "rec1.flv".to_string(),
            started_at_ms: 7,
        });
        let now = 30_000;
        let obs = observe(&state, &[file("rec2.flv", 10, now)], now, WINDOW);
        assert_eq!(obs.next, DetectorState::Idle);
        assert_eq!(
            obs.event,
            Some(DetectorEvent::SessionLost {
                filename: "rec1.flv".to_string(),
                started_at_ms: 7,
            })
        );

        // The new file starts on the following tick.
        let obs = observe(&obs.next, &[file("rec2.flv", 20, now + 3_000)], now + 3_000, WINDOW);
        assert_eq!(
            obs.event,
            Some(DetectorEvent::SessionStarted {
                filename: "rec2.flv".to_string()
            })
        );
    }

    #[test]
    fn test_tie_break_picks_first_in_listing_order() {
        let now = 10_000;
        let snapshot = [file("a.flv", 10, now), file("b.flv", 10, now)];
        let obs = observe(&DetectorState::Idle, &snapshot, now, WINDOW);
        assert_eq!(obs.growing, 2);
        assert_eq!(obs.next.active().unwrap().filename, "a.flv");
    }

    #[test]
    fn test_idle_with_stale_files_stays_idle() {
        let obs = observe(
            &DetectorState::Idle,
            &[file("old.flv", 10_000, 0)],
            600_000,
            WINDOW,
        );
        assert_eq!(obs.next, DetectorState::Idle);
        assert!(obs.event.is_none());
    }
}
