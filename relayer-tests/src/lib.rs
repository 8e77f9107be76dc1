//! End to end harness: relayers of several validators watching the same
//! in-memory EVM chain and voting on one embedded oracle.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use bridge_claim_codec::{ClaimType, SourceContext, WitnessedEvent};
use bridge_event_watcher_traits::mock::MockChainClient;
use bridge_oracle::{Bridge, OracleKeeper, StoreLedger};
use bridge_relayer::service::embedded::EmbeddedOracleClient;
use bridge_relayer::service::relay::FixedDecimals;
use bridge_relayer::service::{start_relay, EmbeddedBridge, RelaySource};
use bridge_relayer_config::event_watcher::EventsWatcherConfig;
use bridge_relayer_config::{BridgeRelayerConfig, TxQueueConfig};
use bridge_relayer_context::key_manager::key_address;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::{HistoryStoreKey, SledStore};
use bridge_relayer_tx_queue::NonceManager;
use bridge_relayer_types::{ChainKind, PrivateKey};
use ethers::types::{H256, U256};

/// Chain id of the mock EVM chain.
pub const EVM_CHAIN_ID: u32 = 1337;
/// The bridge bank of the mock EVM chain.
pub const BRIDGE_BANK: &str = "0xb2c0e2ebbd5e1d6d9b7bbf4e4d8a3f4fcbb0f1a2";
/// Escrow of the embedded oracle ledger.
pub const BRIDGE_EXEC: &str = "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi";
/// Blocks built on top of an event before it is relayed.
pub const MATURITY: u64 = 2;

/// Validator keys; the first one is the leader in every scenario.
pub const KEYS: [&str; 3] = [
    "0x4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d",
    "0x6cbed15c793ce57650b9877cf6fa156fbef513c4e6134f022a85b1ffdd59b2a1",
    "0x6370fd033278c143179d81c5526140625662b8daa446c22ee2d73db3707e620c",
];

/// The address voting with `key`.
pub fn validator_address(key: &str) -> String {
    let key = PrivateKey::from_hex_str(key).expect("valid key");
    key_address(&key).expect("valid address")
}

/// The configuration of the relayer run by the validator holding `key`.
pub fn relayer_config(key: &str) -> BridgeRelayerConfig {
    serde_json::from_value(serde_json::json!({
        "port": 0,
        "evm": {
            "name": "hermes",
            "http-endpoint": "http://127.0.0.1:8545",
            "chain-id": EVM_CHAIN_ID,
            "private-key": key,
            "bridge-bank": BRIDGE_BANK,
            "oracle": BRIDGE_BANK
        },
        "tendermint": {
            "name": "chain33",
            "enabled": false,
            "rpc-endpoint": "http://127.0.0.1:8801",
            "chain-id": 33,
            "private-key": key,
            "bridge-exec-address": BRIDGE_EXEC
        }
    }))
    .expect("valid config")
}

/// A relayer context over a fresh temporary store.
pub fn relayer_context(key: &str) -> RelayerContext {
    let store = SledStore::temporary().expect("temporary store");
    RelayerContext::new(relayer_config(key), store).expect("context")
}

/// An embedded oracle whose validators are [`KEYS`] with `powers`.
pub fn embedded_bridge(powers: [u64; 3], threshold: u64) -> EmbeddedBridge {
    let store = SledStore::temporary().expect("temporary store");
    let keeper = OracleKeeper::new(store.clone());
    for (key, power) in KEYS.iter().zip(powers) {
        keeper
            .add_validator(&validator_address(key), power)
            .expect("new validator");
    }
    keeper
        .set_consensus_threshold(threshold)
        .expect("valid threshold");
    Bridge::new(keeper, StoreLedger::new(store), BRIDGE_EXEC)
}

/// The source facts of the mock EVM chain.
pub fn evm_source() -> SourceContext {
    SourceContext {
        kind: ChainKind::Evm,
        chain_id: u64::from(EVM_CHAIN_ID),
        bridge_contract: BRIDGE_BANK.to_owned(),
    }
}

/// The store key of the mock EVM chain.
pub fn evm_key() -> HistoryStoreKey {
    HistoryStoreKey::new(ChainKind::Evm, EVM_CHAIN_ID)
}

/// A lock of one ether witnessed on the mock EVM chain.
pub fn lock_event(nonce: u64) -> WitnessedEvent {
    WitnessedEvent {
        claim_type: ClaimType::Lock,
        tx_hash: H256::from_low_u64_be(0xbeef + nonce),
        sender: "0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1".into(),
        receiver: "1KSBd17H7ZK8iT37aJztFB22XGwsPTdwE4".into(),
        token: String::new(),
        symbol: "ETH".into(),
        amount: U256::exp10(18),
        nonce,
    }
}

/// Starts the EVM to Tendermint relay of one validator, voting on `bridge`.
pub fn start_evm_relay(
    ctx: &RelayerContext,
    chain: &MockChainClient,
    bridge: &EmbeddedBridge,
) -> bridge_relayer::Result<()> {
    let source = RelaySource {
        client: Arc::new(chain.clone()),
        context: evm_source(),
        decimals: Arc::new(FixedDecimals(18)),
        events_watcher: EventsWatcherConfig {
            polling_interval: 10,
            print_progress_interval: 0,
            ..Default::default()
        },
        maturity_degree: MATURITY,
    };
    let destination = EmbeddedOracleClient::new(
        bridge.clone(),
        ctx.store().clone(),
        ctx.key_manager().clone(),
        ctx.metrics.clone(),
    );
    let tx_queue = TxQueueConfig {
        status_check_interval: 10,
        ..Default::default()
    };
    start_relay(
        ctx,
        source,
        Arc::new(destination),
        Arc::new(NonceManager::new()),
        tx_queue,
    )
}

/// Polls `condition` until it holds, `false` after five seconds.
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll).await.is_ok()
}
