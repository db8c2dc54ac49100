//! Recording pipeline: detection → conversion → upload.
//!
//! The orchestrator owns all mutable detection state and is driven from a
//! single poll loop; per-session work runs in background tasks.

pub mod ledger;
pub mod orchestrator;
pub mod session;
pub mod status;

pub use ledger::ProcessedLedger;
pub use orchestrator::Orchestrator;
pub use session::{PipelineOutcome, RecordingJob, SessionPipeline};
pub use status::{LostSession, PipelineStatus, StatusHandle};
