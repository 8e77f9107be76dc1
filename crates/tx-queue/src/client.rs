use bridge_claim_codec::Claim;
use bridge_relayer_types::TxStatus;

/// Write access to the destination chain of a relay direction.
#[async_trait::async_trait]
pub trait SubmitClient: Send + Sync {
    /// The signing account, fails while the relayer keys are locked.
    fn account(&self) -> bridge_relayer_utils::Result<String>;

    /// The next nonce the chain expects from `account`.
    ///
    /// `None` when the chain has no state for the account yet.
    async fn pending_nonce(
        &self,
        account: &str,
    ) -> bridge_relayer_utils::Result<Option<u64>>;

    /// Signs and broadcasts a transaction carrying `claim` with `nonce`,
    /// returns its hash.
    async fn broadcast(
        &self,
        claim: &Claim,
        nonce: u64,
    ) -> bridge_relayer_utils::Result<String>;

    /// The finality status of a broadcast transaction.
    async fn tx_status(
        &self,
        tx_hash: &str,
    ) -> bridge_relayer_utils::Result<TxStatus>;
}
