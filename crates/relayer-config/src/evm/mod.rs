use bridge_relayer_types::{private_key::PrivateKey, rpc_url::RpcUrl};
use ethereum_types::Address;

use crate::event_watcher::EventsWatcherConfig;

use super::*;

/// EvmChainConfig is the configuration for the EVM chain of the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvmChainConfig {
    /// String that groups configuration for this chain on a human-readable name.
    pub name: String,
    /// Boolean indicating the chain is watched and submitted to.
    #[serde(default)]
    pub enabled: bool,
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// Websocket Endpoint for the live event subscription.
    ///
    /// When missing, new blocks are polled over http.
    #[serde(skip_serializing, default)]
    pub ws_endpoint: Option<RpcUrl>,
    /// chain specific id (output of chainId opcode on EVM networks)
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u32,
    /// The Private Key of this account on this network
    /// the format is more dynamic here:
    /// 1. if it starts with '0x' then this would be raw (64 bytes) hex encoded
    ///    private key.
    ///    Example: 0x8917174396171783496173419137618235192359106130478137647163400318
    ///
    /// 2. if it starts with '$' then it would be considered as an Enviroment variable
    ///    of a hex-encoded private key.
    ///   Example: $GANACHE_PRIVATE_KEY
    ///
    /// When missing, the key has to be imported through the keys endpoint.
    #[serde(skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// The bridge registry, used to discover the other bridge contracts.
    #[serde(default, rename(serialize = "bridgeRegistry"))]
    pub bridge_registry: Option<Address>,
    /// The bridge bank emitting lock and burn events.
    #[serde(default, rename(serialize = "bridgeBank"))]
    pub bridge_bank: Option<Address>,
    /// The oracle contract claims are submitted to.
    #[serde(default)]
    pub oracle: Option<Address>,
    /// How many blocks on top of an event before it is relayed.
    #[serde(
        default = "defaults::maturity_degree",
        rename(serialize = "maturityDegree")
    )]
    pub maturity_degree: u64,
    /// Chain watcher settings.
    #[serde(default, rename(serialize = "eventsWatcher"))]
    pub events_watcher: EventsWatcherConfig,
    /// Transaction queue settings.
    #[serde(default, rename(serialize = "txQueue"))]
    pub tx_queue: TxQueueConfig,
}
