//! Pipeline status endpoint.

use crate::pipeline::{PipelineStatus, StatusHandle};
use axum::{extract::State, response::Json, routing::get, Router};

/// Creates the status router.
pub fn router(status: StatusHandle) -> Router {
    Router::new()
        .route("/status", get(pipeline_status))
        .with_state(status)
}

/// GET /status - current session, upload availability and recent outcomes.
///
/// `isRecording` and `remoteSinkEnabled` are always present; the other
/// fields are informational.
async fn pipeline_status(State(status): State<StatusHandle>) -> Json<PipelineStatus> {
    Json(status.get())
}
