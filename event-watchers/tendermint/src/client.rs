use bridge_claim_codec::tendermint::{decode_bridge_log, is_bridge_executor};
use bridge_claim_codec::WitnessedEvent;
use bridge_event_watcher_traits::ChainClient;
use bridge_relayer_types::{ChainKind, EventLogIndex};
use bridge_relayer_utils::Error;
use ethers::types::H256;
use serde_json::{json, Value};

use crate::rpc::JsonRpcClient;
use crate::types::{
    BlockDetail, BlockDetails, BlocksRequest, Header, TransactionDetail,
    EXEC_OK,
};

/// Reads the bridge executor receipts of a Chain33 style chain.
#[derive(Debug, Clone)]
pub struct TendermintChainClient {
    rpc: JsonRpcClient,
    chain_id: u32,
}

impl TendermintChainClient {
    /// Creates a client over `rpc`.
    pub fn new(rpc: JsonRpcClient, chain_id: u32) -> Self {
        Self { rpc, chain_id }
    }
}

/// Answers of a node asked about a transaction it does not know.
const TX_NOT_EXIST: [&str; 2] = ["tx not exist", "ErrTxNotExist"];

pub(crate) fn is_tx_not_exist(e: &Error) -> bool {
    matches!(
        e,
        Error::JsonRpc { message, .. }
            if TX_NOT_EXIST.iter().any(|answer| message.contains(answer))
    )
}

pub(crate) fn parse_tx_hash(tx_hash: &str) -> bridge_relayer_utils::Result<H256> {
    tx_hash
        .parse()
        .map_err(|_| Error::Decode(format!("invalid tx hash: {tx_hash}")))
}

/// Bridge events of one block, numbered in transaction then log order.
fn block_events(detail: &BlockDetail) -> Vec<(EventLogIndex, WitnessedEvent)> {
    let height = detail.block.height;
    let mut events = Vec::new();
    for (position, tx) in detail.block.txs.iter().enumerate() {
        if !is_bridge_executor(&tx.execer) {
            continue;
        }
        let Some(Some(receipt)) = detail.receipts.get(position) else {
            continue;
        };
        let tx_hash = match parse_tx_hash(&tx.hash) {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                tracing::warn!(error = %e, height, "Skipping bridge transaction");
                continue;
            }
        };
        for log in &receipt.logs {
            match decode_bridge_log(&log.ty_name, &log.log, tx_hash) {
                Ok(Some(event)) => {
                    let index = EventLogIndex {
                        height,
                        index: events.len() as u32,
                    };
                    events.push((index, event));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        height,
                        tx_hash = %tx.hash,
                        "Skipping malformed bridge log",
                    );
                }
            }
        }
    }
    events
}

#[async_trait::async_trait]
impl ChainClient for TendermintChainClient {
    fn kind(&self) -> ChainKind {
        ChainKind::Tendermint
    }

    fn chain_id(&self) -> u32 {
        self.chain_id
    }

    async fn latest_height(&self) -> bridge_relayer_utils::Result<u64> {
        let header: Header =
            self.rpc.call("Chain33.GetLastHeader", Value::Null).await?;
        Ok(header.height)
    }

    #[tracing::instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn fetch_events(
        &self,
        from: u64,
        to: u64,
    ) -> bridge_relayer_utils::Result<Vec<(EventLogIndex, WitnessedEvent)>>
    {
        let request = BlocksRequest {
            start: from,
            end: to,
            is_detail: true,
        };
        let details: BlockDetails = self
            .rpc
            .call("Chain33.GetBlocks", serde_json::to_value(request)?)
            .await?;
        let mut events: Vec<_> =
            details.items.iter().flat_map(block_events).collect();
        events.sort_by_key(|(index, _)| *index);
        tracing::trace!("Found #{} events", events.len());
        Ok(events)
    }

    async fn tx_succeeded(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        let answer: bridge_relayer_utils::Result<TransactionDetail> = self
            .rpc
            .call(
                "Chain33.QueryTransaction",
                json!({ "hash": format!("{tx_hash:?}") }),
            )
            .await;
        match answer {
            Ok(detail) => Ok(detail.receipt.ty == EXEC_OK),
            Err(e) if is_tx_not_exist(&e) => {
                tracing::warn!(?tx_hash, "Source transaction is gone");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
