use std::sync::Arc;

use bridge_claim_codec::{Claim, WitnessedEvent};
use bridge_event_watcher_traits::ChainClient;
use bridge_oracle::{Bridge, Ledger, OracleError, ProphecyStatus};
use bridge_relayer_context::KeyManager;
use bridge_relayer_store::{KeyValueStore, OracleStore};
use bridge_relayer_tx_queue::SubmitClient;
use bridge_relayer_types::{ChainKind, EventLogIndex, TxStatus};
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::probe;
use ethers::types::H256;
use ethers::utils::keccak256;
use tokio::sync::Mutex;

/// Namespace of the receipts of the embedded executor.
const RECEIPTS_NAMESPACE: &str = "embedded-receipts";

/// Votes claims on the oracle running inside the relayer.
///
/// Every vote behaves like a transaction included at once: an accepted vote
/// is a successful receipt, a vote the oracle rejects is a failed one.
pub struct EmbeddedOracleClient<S, L> {
    bridge: Bridge<S, L>,
    store: S,
    keys: KeyManager<S>,
    metrics: Arc<Mutex<Metrics>>,
}

impl<S, L> std::fmt::Debug for EmbeddedOracleClient<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedOracleClient").finish()
    }
}

impl<S, L> EmbeddedOracleClient<S, L>
where
    S: OracleStore + KeyValueStore,
    L: Ledger,
{
    /// Creates a client voting with the Tendermint key of `keys`.
    pub fn new(
        bridge: Bridge<S, L>,
        store: S,
        keys: KeyManager<S>,
        metrics: Arc<Mutex<Metrics>>,
    ) -> Self {
        Self {
            bridge,
            store,
            keys,
            metrics,
        }
    }

    /// The executor the votes go to.
    pub fn bridge(&self) -> &Bridge<S, L> {
        &self.bridge
    }

    fn record(
        &self,
        tx_hash: &str,
        status: TxStatus,
    ) -> bridge_relayer_utils::Result<()> {
        let value = serde_json::to_vec(&status)?;
        self.store
            .put_value(RECEIPTS_NAMESPACE, tx_hash.as_bytes(), &value)
    }
}

/// The receipt hash of a vote.
fn vote_hash(claim: &Claim, nonce: u64) -> String {
    let mut preimage = claim.claim_id.as_bytes().to_vec();
    preimage.extend_from_slice(claim.validator.as_bytes());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    format!("{:?}", H256::from(keccak256(preimage)))
}

#[async_trait::async_trait]
impl<S, L> SubmitClient for EmbeddedOracleClient<S, L>
where
    S: OracleStore + KeyValueStore + 'static,
    L: Ledger + 'static,
{
    fn account(&self) -> bridge_relayer_utils::Result<String> {
        self.keys.address(ChainKind::Tendermint)
    }

    async fn pending_nonce(
        &self,
        _account: &str,
    ) -> bridge_relayer_utils::Result<Option<u64>> {
        Ok(None)
    }

    #[tracing::instrument(skip_all, fields(claim = %claim.claim_id, nonce = nonce))]
    async fn broadcast(
        &self,
        claim: &Claim,
        nonce: u64,
    ) -> bridge_relayer_utils::Result<String> {
        let tx_hash = vote_hash(claim, nonce);
        let status = match self.bridge.process_claim(claim) {
            Ok(outcome) => {
                if outcome.completed_now {
                    let label = match outcome.status {
                        ProphecyStatus::Success => "success",
                        ProphecyStatus::Failed => "failed",
                        ProphecyStatus::Pending => "pending",
                    };
                    self.metrics
                        .lock()
                        .await
                        .prophecies_completed
                        .with_label_values(&[label])
                        .inc();
                }
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Oracle,
                    claim_id = %claim.claim_id,
                    validator = %claim.validator,
                    status = ?outcome.status,
                    completed = outcome.completed_now,
                );
                TxStatus::Success
            }
            Err(OracleError::Store(e)) => return Err(e),
            Err(OracleError::Json(e)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Vote rejected by the oracle");
                TxStatus::Failed
            }
        };
        self.record(&tx_hash, status)?;
        Ok(tx_hash)
    }

    async fn tx_status(
        &self,
        tx_hash: &str,
    ) -> bridge_relayer_utils::Result<TxStatus> {
        let receipt = self
            .store
            .get_value(RECEIPTS_NAMESPACE, tx_hash.as_bytes())?;
        match receipt {
            Some(value) => Ok(serde_json::from_slice(&value)?),
            None => {
                tracing::warn!(%tx_hash, "Unknown vote");
                Ok(TxStatus::Failed)
            }
        }
    }
}

/// Reads the event log of the embedded executor as a Tendermint chain.
///
/// Event `n` sits alone at height `2n` and the head is the odd height right
/// above the last event, so a height is never fetched before its event is
/// committed and the last event is matured at once.
pub struct EmbeddedChainClient<S, L> {
    bridge: Bridge<S, L>,
    chain_id: u32,
}

impl<S, L> std::fmt::Debug for EmbeddedChainClient<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedChainClient")
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl<S, L> EmbeddedChainClient<S, L> {
    /// Creates a client over the log of `bridge`.
    pub fn new(bridge: Bridge<S, L>, chain_id: u32) -> Self {
        Self { bridge, chain_id }
    }
}

#[async_trait::async_trait]
impl<S, L> ChainClient for EmbeddedChainClient<S, L>
where
    S: OracleStore + 'static,
    L: Ledger + 'static,
{
    fn kind(&self) -> ChainKind {
        ChainKind::Tendermint
    }

    fn chain_id(&self) -> u32 {
        self.chain_id
    }

    async fn latest_height(&self) -> bridge_relayer_utils::Result<u64> {
        Ok(self.bridge.last_nonce()? * 2 + 1)
    }

    async fn fetch_events(
        &self,
        from: u64,
        to: u64,
    ) -> bridge_relayer_utils::Result<Vec<(EventLogIndex, WitnessedEvent)>>
    {
        let first = ((from + 1) / 2).max(1);
        let last = (to / 2).min(self.bridge.last_nonce()?);
        if first > last {
            return Ok(Vec::new());
        }
        let events = self
            .bridge
            .events_after(first - 1, (last - first + 1) as usize)?;
        Ok(events
            .into_iter()
            .map(|event| (EventLogIndex::new(event.nonce * 2, 0), event))
            .collect())
    }

    async fn tx_succeeded(
        &self,
        _tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        // events are only logged by a successful commit.
        Ok(true)
    }
}
