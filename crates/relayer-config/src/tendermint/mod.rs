use bridge_relayer_types::{private_key::PrivateKey, rpc_url::RpcUrl};

use crate::event_watcher::EventsWatcherConfig;

use super::*;

/// TendermintConfig is the configuration for the chain running the bridge executor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TendermintConfig {
    /// String that groups configuration for this chain on a human-readable name.
    pub name: String,
    /// Boolean indicating the chain is watched and submitted to.
    #[serde(default)]
    pub enabled: bool,
    /// JSON-RPC endpoint of the node.
    #[serde(skip_serializing)]
    pub rpc_endpoint: RpcUrl,
    /// The chain id carried by claims witnessed on this chain.
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u32,
    /// The private key signing the claims submitted to this chain.
    ///
    /// Same format as the EVM one.
    #[serde(skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// The address of the bridge executor account.
    #[serde(rename(serialize = "bridgeExecAddress"))]
    pub bridge_exec_address: String,
    /// How many blocks on top of an event before it is relayed.
    #[serde(
        default = "defaults::maturity_degree",
        rename(serialize = "maturityDegree")
    )]
    pub maturity_degree: u64,
    /// Fee paid by each submitted transaction, in minimal units.
    #[serde(default = "defaults::tendermint_fee")]
    pub fee: u64,
    /// Chain watcher settings.
    #[serde(default, rename(serialize = "eventsWatcher"))]
    pub events_watcher: EventsWatcherConfig,
    /// Transaction queue settings.
    #[serde(default, rename(serialize = "txQueue"))]
    pub tx_queue: TxQueueConfig,
}
