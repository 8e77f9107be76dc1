use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use bridge_relayer_types::ChainKind;
use serde::Serialize;

use crate::ApiState;

/// Build information of the running binary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    version: &'static str,
    commit: Option<&'static str>,
    branch: Option<&'static str>,
}

/// Signing accounts, absent while locked or not imported.
#[derive(Debug, Serialize)]
pub struct Accounts {
    evm: Option<String>,
    tendermint: Option<String>,
}

/// Answer of `GET /info`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerInformationResponse {
    #[serde(flatten)]
    config: bridge_relayer_config::BridgeRelayerConfig,
    build: BuildInfo,
    unlocked: bool,
    accounts: Accounts,
}

/// Handles the `/info` route.
pub async fn handle_relayer_info(
    State(state): State<Arc<ApiState>>,
) -> Json<RelayerInformationResponse> {
    let keys = state.ctx.key_manager();
    Json(RelayerInformationResponse {
        config: state.ctx.config.clone(),
        build: BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GIT_COMMIT"),
            branch: option_env!("GIT_BRANCH"),
        },
        unlocked: keys.is_unlocked(),
        accounts: Accounts {
            evm: keys.address(ChainKind::Evm).ok(),
            tendermint: keys.address(ChainKind::Tendermint).ok(),
        },
    })
}
