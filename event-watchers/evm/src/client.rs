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

use std::sync::Arc;

use bridge_claim_codec::evm::{bridge_bank_topics, decode_bridge_bank_log};
use bridge_claim_codec::WitnessedEvent;
use bridge_event_watcher_traits::{ChainClient, EventStream};
use bridge_relayer_types::{ChainKind, EventLogIndex};
use ethers::providers::{JsonRpcClient, Middleware, Provider, Ws};
use ethers::types::{Address, Filter, Log, H256, U64};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Reads the bridge bank of an EVM chain.
pub struct EvmChainClient<P> {
    provider: Arc<Provider<P>>,
    ws: Option<Arc<Provider<Ws>>>,
    chain_id: u32,
    bridge_bank: Address,
}

impl<P> std::fmt::Debug for EvmChainClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmChainClient")
            .field("chain_id", &self.chain_id)
            .field("bridge_bank", &self.bridge_bank)
            .field("subscription", &self.ws.is_some())
            .finish()
    }
}

impl<P: JsonRpcClient + 'static> EvmChainClient<P> {
    /// Creates a client polling `bridge_bank` through `provider`.
    pub fn new(
        provider: Arc<Provider<P>>,
        chain_id: u32,
        bridge_bank: Address,
    ) -> Self {
        Self {
            provider,
            ws: None,
            chain_id,
            bridge_bank,
        }
    }

    /// Receives new logs from a websocket subscription instead of polling.
    pub fn with_subscription(mut self, ws: Arc<Provider<Ws>>) -> Self {
        self.ws = Some(ws);
        self
    }

    fn filter(&self) -> Filter {
        Filter::new()
            .address(self.bridge_bank)
            .topic0(bridge_bank_topics())
    }
}

/// Position and content of a bridge bank log.
///
/// Logs of other events, removed logs and logs the bridge schema does not
/// decode are skipped.
fn decode_log(log: &Log) -> Option<(EventLogIndex, WitnessedEvent)> {
    if log.removed == Some(true) {
        return None;
    }
    let index = EventLogIndex {
        height: log.block_number?.as_u64(),
        index: u32::try_from(log.log_index?).ok()?,
    };
    match decode_bridge_bank_log(log) {
        Ok(Some(event)) => Some((index, event)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(
                error = %e,
                tx_hash = ?log.transaction_hash,
                %index,
                "Skipping malformed bridge bank log",
            );
            None
        }
    }
}

#[async_trait::async_trait]
impl<P: JsonRpcClient + 'static> ChainClient for EvmChainClient<P> {
    fn kind(&self) -> ChainKind {
        ChainKind::Evm
    }

    fn chain_id(&self) -> u32 {
        self.chain_id
    }

    async fn latest_height(&self) -> bridge_relayer_utils::Result<u64> {
        let height = self.provider.get_block_number().await?;
        Ok(height.as_u64())
    }

    #[tracing::instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn fetch_events(
        &self,
        from: u64,
        to: u64,
    ) -> bridge_relayer_utils::Result<Vec<(EventLogIndex, WitnessedEvent)>>
    {
        let filter = self
            .filter()
            .from_block(U64::from(from))
            .to_block(U64::from(to));
        let logs = self.provider.get_logs(&filter).await?;
        let mut events: Vec<_> = logs.iter().filter_map(decode_log).collect();
        events.sort_by_key(|(index, _)| *index);
        tracing::trace!("Found #{} events", events.len());
        Ok(events)
    }

    async fn subscribe(
        &self,
    ) -> bridge_relayer_utils::Result<Option<EventStream>> {
        let Some(ws) = self.ws.clone() else {
            return Ok(None);
        };
        let filter = self.filter();
        let (tx, rx) = mpsc::unbounded_channel();
        let chain_id = self.chain_id;
        tokio::spawn(async move {
            let mut logs = match ws.subscribe_logs(&filter).await {
                Ok(logs) => logs,
                Err(e) => {
                    let _ = tx.send(Err(e.into()));
                    return;
                }
            };
            tracing::debug!(chain_id, "Subscribed to bridge bank logs");
            while let Some(log) = logs.next().await {
                let Some(item) = decode_log(&log) else {
                    continue;
                };
                if tx.send(Ok(item)).is_err() {
                    break;
                }
            }
        });
        Ok(Some(UnboundedReceiverStream::new(rx).boxed()))
    }

    async fn tx_succeeded(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        match receipt {
            Some(receipt) => Ok(receipt.status == Some(U64::one())),
            None => {
                // the block holding it was reorged out.
                tracing::warn!(?tx_hash, "Source transaction has no receipt");
                Ok(false)
            }
        }
    }
}
