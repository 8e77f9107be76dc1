use bridge_relayer_utils::Error;
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

use crate::amount::decimal_string;
use crate::claim::{ClaimType, WitnessedEvent};

/// Name of the bridge executor on the Tendermint-style chain.
pub const BRIDGE_EXECUTOR: &str = "x2ethereum";
/// Receipt log name of a lock.
pub const LOCK_LOG_NAME: &str = "LogLock";
/// Receipt log name of a burn.
pub const BURN_LOG_NAME: &str = "LogChain33ToEthBurn";

/// Whether a transaction's executor is the bridge executor, including
/// parachain prefixed names like `user.p.para.x2ethereum`.
pub fn is_bridge_executor(execer: &str) -> bool {
    execer == BRIDGE_EXECUTOR
        || execer
            .strip_suffix(BRIDGE_EXECUTOR)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}

/// The claim type a receipt log name stands for, if any.
pub fn claim_type_of(log_name: &str) -> Option<ClaimType> {
    match log_name {
        LOCK_LOG_NAME => Some(ClaimType::Lock),
        BURN_LOG_NAME => Some(ClaimType::Burn),
        _ => None,
    }
}

/// The payload of a bridge receipt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeLogPayload {
    /// Sender on the Tendermint-style chain.
    pub chain33_sender: String,
    /// Receiver on the EVM chain.
    pub ethereum_receiver: String,
    /// Token contract on the EVM chain the asset maps to.
    #[serde(default)]
    pub token_contract: String,
    /// Symbol of the asset.
    pub symbol: String,
    /// Amount, in 8 decimals.
    #[serde(with = "decimal_string")]
    pub amount: U256,
    /// Nonce of the bridge executor.
    pub nonce: u64,
}

impl BridgeLogPayload {
    /// Turns the payload into a witnessed event of the given transaction.
    pub fn into_event(self, claim_type: ClaimType, tx_hash: H256) -> WitnessedEvent {
        WitnessedEvent {
            claim_type,
            tx_hash,
            sender: self.chain33_sender,
            receiver: self.ethereum_receiver,
            token: self.token_contract,
            symbol: self.symbol,
            amount: self.amount,
            nonce: self.nonce,
        }
    }
}

/// Decodes a bridge receipt log. Returns `Ok(None)` for unrelated log names.
pub fn decode_bridge_log(
    log_name: &str,
    payload: &serde_json::Value,
    tx_hash: H256,
) -> crate::Result<Option<WitnessedEvent>> {
    let Some(claim_type) = claim_type_of(log_name) else {
        return Ok(None);
    };
    let payload = BridgeLogPayload::deserialize(payload)
        .map_err(|e| Error::Decode(format!("{log_name}: {e}")))?;
    Ok(Some(payload.into_event(claim_type, tx_hash)))
}
