use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bridge_relayer_store::SubmissionStore;
use bridge_relayer_types::{Direction, PendingSubmission};
use bridge_relayer_utils::HandlerError;
use serde::Serialize;

use crate::ApiState;

/// The submission log of a direction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionsResponse {
    /// The relay direction.
    pub direction: Direction,
    /// Highest index whose status is resolved.
    pub status_checked_index: u64,
    /// Every submission, in order.
    pub submissions: Vec<PendingSubmission>,
}

/// Transactions submitted in a direction, with their last known status.
pub async fn handle_submissions(
    State(state): State<Arc<ApiState>>,
    Path(direction): Path<String>,
) -> Result<Json<SubmissionsResponse>, HandlerError> {
    let direction: Direction = direction
        .parse()
        .map_err(|e: String| HandlerError(StatusCode::BAD_REQUEST, e))?;
    let store = state.ctx.store();
    Ok(Json(SubmissionsResponse {
        direction,
        status_checked_index: store.status_checked_index(direction)?,
        submissions: store.submissions(direction)?,
    }))
}
