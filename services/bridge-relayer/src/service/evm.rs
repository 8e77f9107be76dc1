use std::sync::Arc;

use bridge_claim_codec::SourceContext;
use bridge_ew_evm::{BridgeContracts, EvmChainClient, RegistryProbe, TokenDecimals};
use bridge_ew_tendermint::TendermintSubmitClient;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_tx_queue::NonceManager;
use bridge_relayer_types::ChainKind;
use ethers::providers::{Provider, Ws};

use super::deployment::{configured_contracts, DeploymentBootstrap};
use super::embedded::EmbeddedOracleClient;
use super::{start_relay, tendermint_rpc, OracleBackend, RelaySource};

/// Finds the bridge contracts of the EVM chain.
///
/// With a `bridge-registry` configured, waits until the registry points at
/// a complete deployment; otherwise the configured addresses are used as is.
pub async fn bridge_contracts(
    ctx: &RelayerContext,
) -> crate::Result<BridgeContracts> {
    let config = &ctx.config.evm;
    match config.bridge_registry {
        Some(registry) => {
            let probe = RegistryProbe::new(Arc::new(ctx.evm_provider()?), registry);
            let bootstrap = DeploymentBootstrap::new(
                probe,
                config,
                ctx.config.deployment.wait_timeout(),
            );
            bootstrap.wait().await
        }
        None => configured_contracts(config),
    }
}

/// Starts the EVM to Tendermint relay.
///
/// Lock and burn events of the bridge bank become votes, either on the
/// embedded oracle or on the bridge executor of the Tendermint node.
#[tracing::instrument(skip_all, fields(chain_id = ctx.config.evm.chain_id))]
pub async fn ignite(
    ctx: &RelayerContext,
    oracle: &OracleBackend,
    contracts: BridgeContracts,
) -> crate::Result<()> {
    let config = &ctx.config.evm;
    let provider = Arc::new(ctx.evm_provider()?);
    let mut client =
        EvmChainClient::new(provider.clone(), config.chain_id, contracts.bridge_bank);
    if let Some(ws) = &config.ws_endpoint {
        let ws = Provider::<Ws>::connect(ws.as_url().as_str()).await?;
        tracing::debug!("Receiving bridge bank logs from a websocket subscription");
        client = client.with_subscription(Arc::new(ws));
    }
    let source = RelaySource {
        client: Arc::new(client),
        context: SourceContext {
            kind: ChainKind::Evm,
            chain_id: u64::from(config.chain_id),
            bridge_contract: format!("{:?}", contracts.bridge_bank),
        },
        decimals: Arc::new(TokenDecimals::new(provider, ctx.store().clone())),
        events_watcher: config.events_watcher,
        maturity_degree: config.maturity_degree,
    };
    let nonces = Arc::new(NonceManager::new());
    let tx_queue = ctx.config.tendermint.tx_queue;
    match oracle {
        OracleBackend::Embedded(bridge) => {
            let destination = EmbeddedOracleClient::new(
                bridge.clone(),
                ctx.store().clone(),
                ctx.key_manager().clone(),
                ctx.metrics.clone(),
            );
            start_relay(ctx, source, Arc::new(destination), nonces, tx_queue)
        }
        OracleBackend::Remote(_) => {
            let destination = TendermintSubmitClient::new(
                tendermint_rpc(&ctx.config)?,
                ctx.key_manager().clone(),
                ctx.config.tendermint.fee,
            );
            start_relay(ctx, source, Arc::new(destination), nonces, tx_queue)
        }
    }
}
