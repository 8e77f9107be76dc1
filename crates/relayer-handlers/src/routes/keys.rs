use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use bridge_relayer_types::ChainKind;
use bridge_relayer_utils::HandlerError;
use serde::{Deserialize, Serialize};

use crate::ApiState;

/// Body of `POST /keys/import`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportKeyRequest {
    /// The chain the key signs for.
    pub chain: ChainKind,
    /// Hex encoded secp256k1 private key.
    pub private_key: String,
    /// The relayer passphrase, set by the first import or unlock.
    pub passphrase: String,
}

/// Answer of `POST /keys/import`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportKeyResponse {
    /// The chain the key signs for.
    pub chain: ChainKind,
    /// Address of the imported key.
    pub address: String,
}

/// Body of `POST /unlock`.
#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    /// The relayer passphrase.
    pub passphrase: String,
}

/// Lock state after a lock or unlock.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockState {
    /// Whether the keys are usable.
    pub unlocked: bool,
}

/// Imports a signing key.
pub async fn handle_import_key(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ImportKeyRequest>,
) -> Result<Json<ImportKeyResponse>, HandlerError> {
    let address = state.ctx.key_manager().import_key(
        req.chain,
        &req.private_key,
        &req.passphrase,
    )?;
    Ok(Json(ImportKeyResponse {
        chain: req.chain,
        address,
    }))
}

/// Unlocks the keys, the chain watchers start syncing.
pub async fn handle_unlock(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<LockState>, HandlerError> {
    state.ctx.key_manager().unlock(&req.passphrase)?;
    Ok(Json(LockState { unlocked: true }))
}

/// Locks the keys.
pub async fn handle_lock(State(state): State<Arc<ApiState>>) -> Json<LockState> {
    state.ctx.key_manager().lock();
    Json(LockState { unlocked: false })
}
