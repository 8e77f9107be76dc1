// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Relayer Service Module 🕸️
//!
//! A module for starting long-running tasks for event watching.
//!
//! ## Overview
//!
//! Services are tasks which the relayer constantly runs throughout its lifetime.
//! Each relay direction gets a chain watcher on its source chain, a submitter
//! to its destination chain and a tracker of the submitted transactions.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bridge_claim_codec::SourceContext;
use bridge_event_watcher_traits::{ChainClient, ChainWatcher};
use bridge_ew_tendermint::{JsonRpcClient, RemoteOracle};
use bridge_oracle::{Bridge, BridgeActions, OracleKeeper, OracleQuery, StoreLedger};
use bridge_relayer_config::event_watcher::EventsWatcherConfig;
use bridge_relayer_config::{BridgeRelayerConfig, OracleMode, TxQueueConfig};
use bridge_relayer_context::RelayerContext;
use bridge_relayer_handlers::{build_router, ApiState};
use bridge_relayer_store::{OracleStore, SledStore};
use bridge_relayer_tx_queue::{NonceManager, SubmitClient, Submitter, TxStatusTracker};
use bridge_relayer_types::Direction;

/// Deployment bootstrap of the bridge contracts.
pub mod deployment;
/// The oracle embedded in the relayer.
pub mod embedded;
/// EVM specific services
pub mod evm;
/// Event to claim relaying.
pub mod relay;
/// Tendermint specific services
pub mod tendermint;

use relay::{DecimalsLookup, RelayHandler};

/// Type alias for [Sled](https://sled.rs)-based database store
pub type Store = SledStore;

/// The executor of the embedded oracle, its ledger kept in the relayer store.
pub type EmbeddedBridge = Bridge<Store, StoreLedger<Store>>;

/// Where claims witnessed on the EVM chain are voted.
#[derive(Clone)]
pub enum OracleBackend {
    /// The oracle running inside the relayer.
    Embedded(EmbeddedBridge),
    /// The bridge executor of the Tendermint node.
    Remote(RemoteOracle),
}

impl std::fmt::Debug for OracleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleBackend::Embedded(_) => f.write_str("Embedded"),
            OracleBackend::Remote(oracle) => {
                f.debug_tuple("Remote").field(oracle).finish()
            }
        }
    }
}

impl OracleBackend {
    /// The read-only queries of the backend.
    pub fn query(&self) -> Arc<dyn OracleQuery> {
        match self {
            OracleBackend::Embedded(bridge) => Arc::new(bridge.keeper().clone()),
            OracleBackend::Remote(oracle) => Arc::new(oracle.clone()),
        }
    }

    /// The lock and burn actions, only offered by the embedded executor.
    pub fn actions(&self) -> Option<Arc<dyn BridgeActions>> {
        match self {
            OracleBackend::Embedded(bridge) => Some(Arc::new(bridge.clone())),
            OracleBackend::Remote(_) => None,
        }
    }
}

/// The JSON-RPC client of the Tendermint node.
pub fn tendermint_rpc(
    config: &BridgeRelayerConfig,
) -> crate::Result<JsonRpcClient> {
    JsonRpcClient::new(config.tendermint.rpc_endpoint.as_url().clone())
}

/// Seeds an empty oracle with the configured validators and threshold.
///
/// An oracle that already has validators is left untouched.
pub fn seed_oracle<S: OracleStore>(
    keeper: &OracleKeeper<S>,
    config: &BridgeRelayerConfig,
) -> crate::Result<()> {
    if !keeper.validators()?.is_empty() {
        return Ok(());
    }
    for validator in &config.validators {
        keeper.add_validator(&validator.address, validator.power)?;
    }
    keeper.set_consensus_threshold(config.consensus_threshold)?;
    tracing::info!(
        validators = config.validators.len(),
        threshold = config.consensus_threshold,
        "Embedded oracle seeded",
    );
    Ok(())
}

/// Sets up the oracle backend selected by `oracle-mode`.
pub fn make_oracle(ctx: &RelayerContext) -> crate::Result<OracleBackend> {
    match ctx.config.oracle_mode {
        OracleMode::Embedded => {
            let keeper = OracleKeeper::new(ctx.store().clone());
            seed_oracle(&keeper, &ctx.config)?;
            let escrow = ctx.config.tendermint.bridge_exec_address.clone();
            Ok(OracleBackend::Embedded(Bridge::new(
                keeper,
                StoreLedger::new(ctx.store().clone()),
                escrow,
            )))
        }
        OracleMode::Remote => Ok(OracleBackend::Remote(RemoteOracle::new(
            tendermint_rpc(&ctx.config)?,
        ))),
    }
}

/// Sets up the web server for the relayer, routing (endpoint queries / requests mapped to
/// handled code). Allows clients to interact with the relayer.
///
/// Returns the address listened on and the server future.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration and database
/// * `oracle` - Where oracle queries and bridge actions are answered
pub fn build_web_services(
    ctx: RelayerContext,
    oracle: &OracleBackend,
) -> crate::Result<(SocketAddr, impl Future<Output = crate::Result<()>>)> {
    let socket_addr = SocketAddr::new([0, 0, 0, 0].into(), ctx.config.port);
    let state = ApiState {
        ctx,
        oracle: oracle.query(),
        bridge: oracle.actions(),
    };
    let app = build_router(state)
        .into_make_service_with_connect_info::<SocketAddr>();
    let server = axum::Server::try_bind(&socket_addr)?.serve(app);
    let addr = server.local_addr();
    Ok((addr, async move { server.await.map_err(Into::into) }))
}

/// Spawns `task`; a failing task shuts the whole relayer down.
pub fn spawn_supervised<F>(
    ctx: &RelayerContext,
    name: &'static str,
    task: F,
) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = crate::Result<()>> + Send + 'static,
{
    let ctx = ctx.clone();
    tokio::spawn(async move {
        match task.await {
            Ok(()) => tracing::debug!(task = name, "Task stopped"),
            Err(e) => {
                tracing::error!(task = name, error = %e, "Task failed, shutting down");
                ctx.shutdown();
            }
        }
    })
}

/// Runs `task` until it ends or the relayer shuts down.
async fn until_shutdown<F>(ctx: RelayerContext, task: F) -> crate::Result<()>
where
    F: Future<Output = crate::Result<()>>,
{
    let mut shutdown = ctx.shutdown_signal();
    tokio::select! {
        _ = shutdown.recv() => Ok(()),
        r = task => r,
    }
}

/// The source side of a relay direction.
pub struct RelaySource<C> {
    /// Client of the source chain.
    pub client: Arc<C>,
    /// Facts about the source chain carried by the claims.
    pub context: SourceContext,
    /// Decimals of the witnessed tokens.
    pub decimals: Arc<dyn DecimalsLookup>,
    /// Watcher settings of the source chain.
    pub events_watcher: EventsWatcherConfig,
    /// Blocks on top of an event before it is relayed.
    pub maturity_degree: u64,
}

/// Starts one relay direction: the status tracker of the destination and,
/// unless disabled, the watcher of the source.
///
/// `nonces` is shared by every submitter of the same destination chain.
#[tracing::instrument(skip_all, fields(source = %source.client.kind()))]
pub fn start_relay<C, D>(
    ctx: &RelayerContext,
    source: RelaySource<C>,
    destination: Arc<D>,
    nonces: Arc<NonceManager>,
    tx_queue: TxQueueConfig,
) -> crate::Result<()>
where
    C: ChainClient + 'static,
    D: SubmitClient + 'static,
{
    let direction = Direction::from_source(source.client.kind());
    let store = ctx.store().clone();
    let tracker = TxStatusTracker::new(
        direction,
        destination.clone(),
        store.clone(),
        tx_queue.status_check_interval(),
        tx_queue.wait_mined_timeout(),
    );
    spawn_supervised(ctx, "tx-status", until_shutdown(ctx.clone(), tracker.run()));

    if !source.events_watcher.enabled {
        tracing::warn!(%direction, "Chain watcher is disabled");
        return Ok(());
    }
    let submitter = Submitter::new(
        direction,
        destination,
        store.clone(),
        nonces,
        tx_queue,
        ctx.metrics.clone(),
    );
    let handler = RelayHandler::new(source.context, source.decimals, submitter);
    let watcher = ChainWatcher::new(
        source.client,
        store,
        source.events_watcher,
        source.maturity_degree,
    )
    .with_handler(Arc::new(handler));
    let task_ctx = ctx.clone();
    spawn_supervised(ctx, "chain-watcher", async move {
        watcher.run(&task_ctx).await
    });
    tracing::debug!(%direction, "Relay started");
    Ok(())
}

/// Starts all background services for both relay directions.
///
/// Waits for the bridge contracts first, then returns once every task is
/// spawned.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration
/// * `oracle` - Where claims witnessed on the EVM chain are voted
pub async fn ignite(
    ctx: RelayerContext,
    oracle: OracleBackend,
) -> crate::Result<()> {
    tracing::trace!(
        "Relayer configuration: {}",
        serde_json::to_string_pretty(&ctx.config)?
    );
    let contracts = evm::bridge_contracts(&ctx).await?;
    if ctx.config.evm.enabled {
        evm::ignite(&ctx, &oracle, contracts).await?;
    }
    if ctx.config.tendermint.enabled {
        tendermint::ignite(&ctx, &oracle, contracts)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bridge_oracle::Ledger;
    use bridge_relayer_store::InMemoryStore;

    use super::*;

    fn config() -> BridgeRelayerConfig {
        serde_json::from_value(serde_json::json!({
            "consensus-threshold": 60,
            "validators": [
                { "address": "0xAA", "power": 80 },
                { "address": "0xbb", "power": 20 }
            ],
            "evm": {
                "name": "evm",
                "enabled": true,
                "http-endpoint": "http://127.0.0.1:8545",
                "chain-id": 1337
            },
            "tendermint": {
                "name": "chain33",
                "enabled": true,
                "rpc-endpoint": "http://127.0.0.1:8801",
                "chain-id": 33,
                "bridge-exec-address": "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi"
            }
        }))
        .unwrap()
    }

    #[test]
    fn oracle_should_be_seeded_once() {
        let keeper = OracleKeeper::new(InMemoryStore::default());
        let config = config();
        seed_oracle(&keeper, &config).unwrap();
        assert_eq!(keeper.total_power().unwrap(), 100);
        assert_eq!(keeper.consensus_threshold().unwrap(), 60);
        assert_eq!(keeper.validators().unwrap()[0].address, "0xaa");

        keeper.remove_validator("0xbb").unwrap();
        seed_oracle(&keeper, &config).unwrap();
        // a seeded oracle keeps its own state.
        assert_eq!(keeper.total_power().unwrap(), 80);
    }

    #[tokio::test]
    async fn oracle_mode_should_select_the_backend() {
        let mut config = config();
        let ctx = RelayerContext::new(config.clone(), SledStore::temporary().unwrap()).unwrap();
        let backend = make_oracle(&ctx).unwrap();
        assert!(matches!(backend, OracleBackend::Embedded(_)));
        assert_eq!(backend.query().total_power().await.unwrap(), 100);
        assert!(backend.actions().is_some());

        config.oracle_mode = OracleMode::Remote;
        let ctx = RelayerContext::new(config, SledStore::temporary().unwrap()).unwrap();
        let backend = make_oracle(&ctx).unwrap();
        assert!(matches!(backend, OracleBackend::Remote(_)));
        assert!(backend.actions().is_none());
    }

    #[test]
    fn embedded_credits_should_survive_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let claim = bridge_claim_codec::Claim::new(
            bridge_claim_codec::ClaimContent {
                claim_type: bridge_claim_codec::ClaimType::Lock,
                source_chain_id: 1337,
                bridge_contract: "0xbank".into(),
                nonce: 9,
                sender: "0xsender".into(),
                receiver: "1receiver".into(),
                token: String::new(),
                symbol: "eth".into(),
                amount: 100u64.into(),
            },
            "0xaa",
        );
        {
            let ctx = RelayerContext::new(config(), SledStore::open(tmp.path()).unwrap()).unwrap();
            let OracleBackend::Embedded(bridge) = make_oracle(&ctx).unwrap() else {
                panic!("expected the embedded oracle");
            };
            assert!(bridge.process_claim(&claim).unwrap().succeeded_now());
        }
        let ctx = RelayerContext::new(config(), SledStore::open(tmp.path()).unwrap()).unwrap();
        let OracleBackend::Embedded(bridge) = make_oracle(&ctx).unwrap() else {
            panic!("expected the embedded oracle");
        };
        let balance = bridge.ledger().balance("1receiver", "eth").unwrap();
        assert_eq!(balance, bridge_claim_codec::denormalize_amount(100u64.into(), 8).unwrap());
    }
}
