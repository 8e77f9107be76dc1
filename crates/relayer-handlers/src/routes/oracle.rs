use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bridge_oracle::{ProphecyView, Validator};
use bridge_relayer_utils::HandlerError;
use serde::Serialize;

use crate::ApiState;

/// A single number answer.
#[derive(Debug, Serialize)]
pub struct ValueResponse {
    /// The value.
    pub value: u64,
}

/// The validator set.
pub async fn handle_validators(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<Validator>>, HandlerError> {
    Ok(Json(state.oracle.validators().await?))
}

/// Sum of the validators' power.
pub async fn handle_total_power(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ValueResponse>, HandlerError> {
    let value = state.oracle.total_power().await?;
    Ok(Json(ValueResponse { value }))
}

/// The consensus threshold, in percent.
pub async fn handle_consensus_threshold(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ValueResponse>, HandlerError> {
    let value = state.oracle.consensus_threshold().await?;
    Ok(Json(ValueResponse { value }))
}

/// A prophecy by its oracle id.
pub async fn handle_prophecy(
    State(state): State<Arc<ApiState>>,
    Path(claim_id): Path<String>,
) -> Result<Json<ProphecyView>, HandlerError> {
    state.oracle.prophecy(&claim_id).await?.map(Json).ok_or_else(|| {
        HandlerError(
            StatusCode::NOT_FOUND,
            format!("Prophecy {claim_id} not found"),
        )
    })
}
