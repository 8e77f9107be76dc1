use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bridge_claim_codec::WitnessedEvent;
use bridge_oracle::{BridgeActions, TransferRequest};
use bridge_relayer_utils::HandlerError;

use crate::ApiState;

fn actions(state: &ApiState) -> Result<&Arc<dyn BridgeActions>, HandlerError> {
    state.bridge.as_ref().ok_or_else(|| {
        HandlerError(
            StatusCode::NOT_FOUND,
            "Bridge actions need the embedded oracle".to_string(),
        )
    })
}

/// Locks an asset of the prophecy chain, the event is relayed to the EVM side.
pub async fn handle_lock(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<WitnessedEvent>, HandlerError> {
    let event = actions(&state)?
        .lock(&req)
        .map_err(bridge_relayer_utils::Error::from)?;
    Ok(Json(event))
}

/// Burns a bridged asset, the event is relayed to the EVM side.
pub async fn handle_burn(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<WitnessedEvent>, HandlerError> {
    let event = actions(&state)?
        .burn(&req)
        .map_err(bridge_relayer_utils::Error::from)?;
    Ok(Json(event))
}
