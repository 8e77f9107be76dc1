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

use bridge_claim_codec::Claim;
use bridge_relayer_config::TxQueueConfig;
use bridge_relayer_store::SubmissionStore;
use bridge_relayer_types::{Direction, TxStatus};
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::{probe, Error};
use tokio::sync::Mutex;

use crate::client::SubmitClient;
use crate::nonce::NonceManager;

/// Submits claims of one direction to its destination chain.
pub struct Submitter<C, S> {
    direction: Direction,
    client: Arc<C>,
    store: S,
    nonces: Arc<NonceManager>,
    config: TxQueueConfig,
    metrics: Arc<Mutex<Metrics>>,
}

impl<C, S> Clone for Submitter<C, S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            direction: self.direction,
            client: self.client.clone(),
            store: self.store.clone(),
            nonces: self.nonces.clone(),
            config: self.config,
            metrics: self.metrics.clone(),
        }
    }
}

impl<C, S> std::fmt::Debug for Submitter<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("direction", &self.direction)
            .finish()
    }
}

impl<C, S> Submitter<C, S>
where
    C: SubmitClient,
    S: SubmissionStore,
{
    /// Creates a submitter for `direction`.
    pub fn new(
        direction: Direction,
        client: Arc<C>,
        store: S,
        nonces: Arc<NonceManager>,
        config: TxQueueConfig,
        metrics: Arc<Mutex<Metrics>>,
    ) -> Self {
        Self {
            direction,
            client,
            store,
            nonces,
            config,
            metrics,
        }
    }

    /// The relay direction served.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The destination chain client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Broadcasts a transaction carrying `claim` and records it in the
    /// submission log, returns the transaction hash.
    ///
    /// The account lock is held until the broadcast finished, so a failed
    /// broadcast gives its nonce back before anyone else allocates.
    #[tracing::instrument(skip_all, fields(direction = %self.direction, claim = %claim.claim_id))]
    pub async fn submit(
        &self,
        claim: &Claim,
    ) -> bridge_relayer_utils::Result<String> {
        let account = self.client.account()?;
        let state = self.nonces.state(&account);
        let mut state = state.lock().await;
        if !state.is_seeded() {
            let pending = self.client.pending_nonce(&account).await?;
            tracing::debug!(%account, ?pending, "Seeding the nonce cache");
            state.seed(pending.unwrap_or_default());
        }
        let nonce = state.allocate()?;
        let tx_hash = match self.client.broadcast(claim, nonce).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                state.revoke(nonce)?;
                let metrics = self.metrics.lock().await;
                metrics.nonce_rollbacks.inc();
                metrics
                    .submission_failures
                    .with_label_values(&[self.direction.as_str()])
                    .inc();
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::TxQueue,
                    direction = %self.direction,
                    errored = true,
                    nonce,
                    error = %e,
                );
                return Err(e);
            }
        };
        drop(state);

        let submission = self.store.append_submission(self.direction, &tx_hash)?;
        self.metrics
            .lock()
            .await
            .claims_submitted
            .with_label_values(&[self.direction.as_str()])
            .inc();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::TxQueue,
            direction = %self.direction,
            pending = true,
            nonce,
            index = submission.index,
            %tx_hash,
        );
        tracing::info!(%tx_hash, nonce, "Claim submitted");
        Ok(tx_hash)
    }

    /// Polls the status of `tx_hash` until it is resolved.
    ///
    /// Fails with [`Error::TxNotMined`] once `wait-mined-timeout` elapsed.
    #[tracing::instrument(skip(self))]
    pub async fn wait_for_mined(
        &self,
        tx_hash: &str,
    ) -> bridge_relayer_utils::Result<TxStatus> {
        let poll = async {
            loop {
                match self.client.tx_status(tx_hash).await {
                    Ok(TxStatus::Pending) => {}
                    Ok(status) => return status,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to query tx status");
                    }
                }
                tokio::time::sleep(self.config.wait_mined_poll_interval())
                    .await;
            }
        };
        tokio::time::timeout(self.config.wait_mined_timeout(), poll)
            .await
            .map_err(|_| Error::TxNotMined {
                tx_hash: tx_hash.to_owned(),
            })
    }

    /// Hashes of every transaction submitted in this direction, in order.
    pub fn submitted_tx_hashes(
        &self,
    ) -> bridge_relayer_utils::Result<Vec<String>> {
        Ok(self
            .store
            .submissions(self.direction)?
            .into_iter()
            .map(|s| s.tx_hash)
            .collect())
    }
}
