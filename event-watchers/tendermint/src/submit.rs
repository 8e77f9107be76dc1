use bridge_claim_codec::tendermint::BRIDGE_EXECUTOR;
use bridge_claim_codec::{Claim, ClaimType, CLAIM_DECIMALS};
use bridge_relayer_context::KeyManager;
use bridge_relayer_store::KeyValueStore;
use bridge_relayer_tx_queue::SubmitClient;
use bridge_relayer_types::{ChainKind, TxStatus};
use bridge_relayer_utils::Error;
use prost::Message;
use serde_json::{json, Value};

use crate::client::{is_tx_not_exist, parse_tx_hash};
use crate::rpc::JsonRpcClient;
use crate::sign::{decode_tx_hex, sign_transaction};
use crate::types::{CreateTxRequest, TransactionDetail, EXEC_OK};

/// Seconds a signed transaction stays valid.
const TX_EXPIRE_SECS: i64 = 3600;

/// Submits claims to the bridge executor of a Chain33 style chain.
///
/// The node assembles the transaction and the relayer signs it locally, the
/// allocated nonce is not carried on chain.
pub struct TendermintSubmitClient<S> {
    rpc: JsonRpcClient,
    keys: KeyManager<S>,
    fee: u64,
}

impl<S> std::fmt::Debug for TendermintSubmitClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TendermintSubmitClient")
            .field("endpoint", &self.rpc.endpoint().as_str())
            .field("fee", &self.fee)
            .finish()
    }
}

impl<S> TendermintSubmitClient<S>
where
    S: KeyValueStore,
{
    /// Creates a client paying `fee` per transaction.
    pub fn new(rpc: JsonRpcClient, keys: KeyManager<S>, fee: u64) -> Self {
        Self { rpc, keys, fee }
    }
}

/// The executor action carrying a claim of the given type.
pub fn action_name(claim_type: ClaimType) -> &'static str {
    match claim_type {
        ClaimType::Lock => "Eth2Chain33Lock",
        ClaimType::Burn => "Eth2Chain33Burn",
    }
}

/// The executor payload of `claim`, amount kept in claim decimals.
pub fn claim_payload(claim: &Claim) -> Value {
    let content = &claim.content;
    json!({
        "ethereumChainID": content.source_chain_id,
        "bridgeContractAddress": content.bridge_contract,
        "nonce": content.nonce,
        "localCoinSymbol": content.symbol,
        "tokenContractAddress": content.token,
        "ethereumSender": content.sender,
        "chain33Receiver": content.receiver,
        "validatorAddress": claim.validator,
        "amount": content.amount.to_string(),
        "claimType": content.claim_type.to_u8(),
        "decimals": CLAIM_DECIMALS,
    })
}

fn unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl<S> SubmitClient for TendermintSubmitClient<S>
where
    S: KeyValueStore + Send + Sync,
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
        let key = self.keys.signing_key(ChainKind::Tendermint)?;
        let create = CreateTxRequest {
            execer: BRIDGE_EXECUTOR,
            action_name: action_name(claim.content.claim_type),
            payload: claim_payload(claim),
        };
        let tx_hex: String = self
            .rpc
            .call("Chain33.CreateTransaction", serde_json::to_value(create)?)
            .await?;
        let mut tx = decode_tx_hex(&tx_hex)?;
        let fee = i64::try_from(self.fee)
            .map_err(|_| Error::Generic("transaction fee out of range"))?;
        sign_transaction(&mut tx, &key, fee, unix_secs() + TX_EXPIRE_SECS)?;
        let signed = hex::encode(tx.encode_to_vec());
        let tx_hash: String = self
            .rpc
            .call("Chain33.SendTransaction", json!({ "data": signed }))
            .await?;
        parse_tx_hash(&tx_hash)?;
        Ok(tx_hash.to_lowercase())
    }

    async fn tx_status(
        &self,
        tx_hash: &str,
    ) -> bridge_relayer_utils::Result<TxStatus> {
        let answer: bridge_relayer_utils::Result<TransactionDetail> = self
            .rpc
            .call("Chain33.QueryTransaction", json!({ "hash": tx_hash }))
            .await;
        match answer {
            Ok(detail) if detail.receipt.ty == EXEC_OK => Ok(TxStatus::Success),
            Ok(_) => Ok(TxStatus::Failed),
            Err(e) if is_tx_not_exist(&e) => Ok(TxStatus::Pending),
            Err(e) => Err(e),
        }
    }
}
