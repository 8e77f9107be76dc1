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

use bridge_claim_codec::WitnessedEvent;
use bridge_relayer_types::{ChainKind, EventLogIndex};
use ethers::types::H256;
use futures::stream::BoxStream;

/// Bridge events pushed by a chain subscription.
pub type EventStream = BoxStream<
    'static,
    bridge_relayer_utils::Result<(EventLogIndex, WitnessedEvent)>,
>;

/// Read access to a chain, as far as the bridge is concerned.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Which side of the bridge this chain is.
    fn kind(&self) -> ChainKind;

    /// The chain id.
    fn chain_id(&self) -> u32;

    /// The current height of the chain.
    async fn latest_height(&self) -> bridge_relayer_utils::Result<u64>;

    /// Bridge events in the blocks `from..=to`, in chain order.
    async fn fetch_events(
        &self,
        from: u64,
        to: u64,
    ) -> bridge_relayer_utils::Result<Vec<(EventLogIndex, WitnessedEvent)>>;

    /// A push stream of new bridge events, `None` when the chain can only be polled.
    async fn subscribe(
        &self,
    ) -> bridge_relayer_utils::Result<Option<EventStream>> {
        Ok(None)
    }

    /// Whether the transaction exists and executed successfully.
    async fn tx_succeeded(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool>;
}
