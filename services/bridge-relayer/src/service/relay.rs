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

use bridge_claim_codec::{build_claim, SourceContext, WitnessedEvent};
use bridge_event_watcher_traits::EventHandler;
use bridge_ew_evm::TokenDecimals;
use bridge_relayer_store::{KeyValueStore, SubmissionStore};
use bridge_relayer_tx_queue::{SubmitClient, Submitter};
use bridge_relayer_types::EventLogIndex;
use ethers::providers::JsonRpcClient;

/// Where the decimals of a witnessed token come from.
#[async_trait::async_trait]
pub trait DecimalsLookup: Send + Sync {
    /// Decimals of the amounts emitted for `token`.
    async fn decimals(&self, token: &str) -> bridge_relayer_utils::Result<u8>;
}

/// Every token has the same decimals.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecimals(pub u8);

#[async_trait::async_trait]
impl DecimalsLookup for FixedDecimals {
    async fn decimals(&self, _token: &str) -> bridge_relayer_utils::Result<u8> {
        Ok(self.0)
    }
}

#[async_trait::async_trait]
impl<P, S> DecimalsLookup for TokenDecimals<P, S>
where
    P: JsonRpcClient + 'static,
    S: KeyValueStore + 'static,
{
    async fn decimals(&self, token: &str) -> bridge_relayer_utils::Result<u8> {
        TokenDecimals::decimals(self, token).await
    }
}

/// Turns the witnessed events of one chain into claims submitted to the
/// other one, voted by the destination account.
pub struct RelayHandler<C, S> {
    source: SourceContext,
    decimals: Arc<dyn DecimalsLookup>,
    submitter: Submitter<C, S>,
}

impl<C, S> std::fmt::Debug for RelayHandler<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayHandler")
            .field("source", &self.source)
            .field("submitter", &self.submitter)
            .finish()
    }
}

impl<C, S> RelayHandler<C, S> {
    /// Creates a handler relaying the events of `source`.
    pub fn new(
        source: SourceContext,
        decimals: Arc<dyn DecimalsLookup>,
        submitter: Submitter<C, S>,
    ) -> Self {
        Self {
            source,
            decimals,
            submitter,
        }
    }
}

#[async_trait::async_trait]
impl<C, S> EventHandler for RelayHandler<C, S>
where
    C: SubmitClient + 'static,
    S: SubmissionStore + 'static,
{
    #[tracing::instrument(skip_all, fields(%index, direction = %self.submitter.direction()))]
    async fn handle_event(
        &self,
        index: EventLogIndex,
        event: &WitnessedEvent,
    ) -> bridge_relayer_utils::Result<()> {
        let decimals = self.decimals.decimals(&event.token).await?;
        let validator = self.submitter.client().account()?;
        let claim = build_claim(&self.source, event, decimals, &validator)?;
        let tx_hash = self.submitter.submit(&claim).await?;
        tracing::debug!(claim = %claim.claim_id, %tx_hash, "Event relayed");
        Ok(())
    }
}
