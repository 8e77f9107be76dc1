use std::sync::Arc;

use bridge_claim_codec::{SourceContext, CLAIM_DECIMALS};
use bridge_event_watcher_traits::ChainClient;
use bridge_ew_evm::{BridgeContracts, EvmSubmitClient};
use bridge_ew_tendermint::TendermintChainClient;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_tx_queue::NonceManager;
use bridge_relayer_types::ChainKind;

use super::embedded::EmbeddedChainClient;
use super::relay::FixedDecimals;
use super::{start_relay, tendermint_rpc, OracleBackend, RelaySource};

/// Starts the Tendermint to EVM relay.
///
/// Lock and burn logs of the bridge executor become `newOracleClaim` calls on
/// the oracle contract. Amounts on the Tendermint side always carry
/// [`CLAIM_DECIMALS`] decimals. With the embedded oracle the executor is the
/// one inside the relayer, its events are relayed as they are committed.
#[tracing::instrument(skip_all, fields(chain_id = ctx.config.tendermint.chain_id))]
pub fn ignite(
    ctx: &RelayerContext,
    oracle: &OracleBackend,
    contracts: BridgeContracts,
) -> crate::Result<()> {
    let config = &ctx.config.tendermint;
    match oracle {
        OracleBackend::Embedded(bridge) => {
            let client = EmbeddedChainClient::new(bridge.clone(), config.chain_id);
            relay_to_evm(ctx, Arc::new(client), 0, contracts)
        }
        OracleBackend::Remote(_) => {
            let client = TendermintChainClient::new(
                tendermint_rpc(&ctx.config)?,
                config.chain_id,
            );
            relay_to_evm(ctx, Arc::new(client), config.maturity_degree, contracts)
        }
    }
}

fn relay_to_evm<C>(
    ctx: &RelayerContext,
    client: Arc<C>,
    maturity_degree: u64,
    contracts: BridgeContracts,
) -> crate::Result<()>
where
    C: ChainClient + 'static,
{
    let config = &ctx.config.tendermint;
    let source = RelaySource {
        client,
        context: SourceContext {
            kind: ChainKind::Tendermint,
            chain_id: u64::from(config.chain_id),
            bridge_contract: config.bridge_exec_address.clone(),
        },
        decimals: Arc::new(FixedDecimals(CLAIM_DECIMALS)),
        events_watcher: config.events_watcher,
        maturity_degree,
    };
    let destination = EvmSubmitClient::new(
        Arc::new(ctx.evm_provider()?),
        contracts.oracle,
        ctx.key_manager().clone(),
        ctx.config.evm.chain_id,
    );
    start_relay(
        ctx,
        source,
        Arc::new(destination),
        Arc::new(NonceManager::new()),
        ctx.config.evm.tx_queue,
    )
}
