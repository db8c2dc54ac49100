//! Recording directory watcher.
//!
//! Turns periodic directory listings into session start/stop events for the
//! single recording the external recorder is writing.

pub mod detector;
pub mod snapshot;

pub use detector::{observe, ActiveSession, DetectorEvent, DetectorState, Observation};
pub use snapshot::{RecordingFileInfo, SnapshotReader};
