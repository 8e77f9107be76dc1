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

use std::fmt;

use bridge_relayer_types::ChainKind;
use bridge_relayer_utils::Error;
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

use crate::amount::{self, decimal_string};
use crate::id;

/// Which kind of bridge event a claim witnesses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    /// Assets were locked on the source chain.
    Lock,
    /// Bridged assets were burned on the source chain.
    Burn,
}

impl ClaimType {
    /// The suffix used in oracle ids.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Lock => "lock",
            ClaimType::Burn => "burn",
        }
    }

    /// The numeric value the bridge contracts expect.
    pub const fn to_u8(&self) -> u8 {
        match self {
            ClaimType::Burn => 1,
            ClaimType::Lock => 2,
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbol of the EVM native asset, the only asset without a token contract.
pub const NATIVE_SYMBOL: &str = "eth";
/// Decimals of the EVM native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Whether the token address denotes the native asset.
///
/// Token addresses always live in the EVM address space: a Tendermint-side
/// event carries the EVM contract its asset maps to.
pub fn is_native_token(token: &str) -> bool {
    let hex = token.strip_prefix("0x").unwrap_or(token);
    hex.chars().all(|c| c == '0')
}

/// A bridge event as witnessed on the source chain, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessedEvent {
    /// Lock or burn.
    pub claim_type: ClaimType,
    /// Hash of the source transaction.
    pub tx_hash: H256,
    /// Address of the sender on the source chain.
    pub sender: String,
    /// Address of the receiver on the destination chain.
    pub receiver: String,
    /// Token on the source chain, empty or all zero for the native asset.
    pub token: String,
    /// Symbol as emitted, not canonicalized yet.
    pub symbol: String,
    /// Amount in the token's own decimals.
    #[serde(with = "decimal_string")]
    pub amount: U256,
    /// Nonce of the source bridge contract.
    pub nonce: u64,
}

impl WitnessedEvent {
    /// The relay layer claim id of this event.
    pub fn relay_claim_id(&self) -> H256 {
        id::build_relay_claim_id(
            self.tx_hash.as_bytes(),
            &self.sender,
            &self.receiver,
            &self.symbol.to_lowercase(),
            self.amount,
        )
    }
}

/// What validators vote on: everything about a claim except who casts it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimContent {
    /// Lock or burn.
    pub claim_type: ClaimType,
    /// Chain id of the source chain.
    pub source_chain_id: u64,
    /// Bridge contract (or executor) that emitted the event.
    pub bridge_contract: String,
    /// Nonce of the source bridge contract.
    pub nonce: u64,
    /// Sender on the source chain.
    pub sender: String,
    /// Receiver on the destination chain.
    pub receiver: String,
    /// Token on the source chain, empty for the native asset.
    pub token: String,
    /// Lower-cased symbol.
    pub symbol: String,
    /// Amount normalized to 8 decimals.
    #[serde(with = "decimal_string")]
    pub amount: U256,
}

impl ClaimContent {
    /// The consensus layer id of the claim.
    pub fn oracle_id(&self) -> String {
        id::build_oracle_id(
            self.source_chain_id,
            self.nonce,
            &self.sender,
            &self.token,
            self.claim_type,
        )
    }

    /// A canonical serialization, used to group equal votes.
    pub fn content_key(&self) -> String {
        // field order is fixed by the struct so the output is deterministic.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// The asset identity on the prophecy chain: symbol followed by token.
    pub fn asset(&self) -> String {
        format!("{}{}", self.symbol, self.token).to_lowercase()
    }
}

/// A claim as cast by one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// The oracle id of the claim.
    pub claim_id: String,
    /// The content being voted on.
    #[serde(flatten)]
    pub content: ClaimContent,
    /// Address of the validator casting this vote.
    pub validator: String,
    /// Content address of the source event, see [`WitnessedEvent::relay_claim_id`].
    ///
    /// Zero when the claim was not built from a witnessed event.
    #[serde(default)]
    pub relay_id: H256,
}

impl Claim {
    /// Builds a claim from its content, deriving the id.
    pub fn new(content: ClaimContent, validator: impl Into<String>) -> Self {
        Self {
            claim_id: content.oracle_id(),
            content,
            validator: validator.into(),
            relay_id: H256::zero(),
        }
    }

    /// Sets the relay layer claim id.
    pub fn with_relay_id(mut self, relay_id: H256) -> Self {
        self.relay_id = relay_id;
        self
    }
}

/// Source chain facts needed to turn a [`WitnessedEvent`] into a [`Claim`].
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Kind of the source chain.
    pub kind: ChainKind,
    /// Chain id of the source chain.
    pub chain_id: u64,
    /// Bridge contract (or executor) on the source chain.
    pub bridge_contract: String,
}

/// Canonicalizes a witnessed event into a claim cast by `validator`.
///
/// `token_decimals` is the decimals of the amount as emitted; it is ignored
/// for the native asset witnessed on the EVM chain.
#[tracing::instrument(skip_all, fields(tx = %event.tx_hash, nonce = event.nonce))]
pub fn build_claim(
    source: &SourceContext,
    event: &WitnessedEvent,
    token_decimals: u8,
    validator: &str,
) -> crate::Result<Claim> {
    let mut symbol = event.symbol.to_lowercase();
    let native = is_native_token(&event.token);
    if native && symbol.is_empty() {
        symbol = NATIVE_SYMBOL.to_owned();
    }
    if native != (symbol == NATIVE_SYMBOL) {
        return Err(Error::NativeAddressMismatch {
            symbol,
            token: event.token.clone(),
        });
    }
    let (token, decimals) = match (native, source.kind) {
        (true, ChainKind::Evm) => (String::new(), NATIVE_DECIMALS),
        (true, ChainKind::Tendermint) => (String::new(), token_decimals),
        (false, _) => (event.token.to_lowercase(), token_decimals),
    };
    let amount = amount::normalize_amount(event.amount, decimals)?;
    let content = ClaimContent {
        claim_type: event.claim_type,
        source_chain_id: source.chain_id,
        bridge_contract: source.bridge_contract.clone(),
        nonce: event.nonce,
        sender: event.sender.to_lowercase(),
        receiver: event.receiver.clone(),
        token,
        symbol,
        amount,
    };
    Ok(Claim::new(content, validator).with_relay_id(event.relay_claim_id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evm_source() -> SourceContext {
        SourceContext {
            kind: ChainKind::Evm,
            chain_id: 1,
            bridge_contract: "0xbank".into(),
        }
    }

    fn lock_event(token: &str, symbol: &str, amount: U256) -> WitnessedEvent {
        WitnessedEvent {
            claim_type: ClaimType::Lock,
            tx_hash: H256::repeat_byte(0x11),
            sender: "0xAbCd".into(),
            receiver: "1Receiver".into(),
            token: token.into(),
            symbol: symbol.into(),
            amount,
            nonce: 7,
        }
    }

    #[test]
    fn build_native_claim_should_work() {
        let event = lock_event(
            "0x0000000000000000000000000000000000000000",
            "ETH",
            U256::from(100u64) * U256::exp10(18),
        );
        let claim = build_claim(&evm_source(), &event, 0, "0xvalidator").unwrap();
        assert_eq!(claim.content.symbol, "eth");
        assert_eq!(claim.content.token, "");
        assert_eq!(claim.content.amount, U256::from(100u64) * U256::exp10(8));
        assert_eq!(claim.content.sender, "0xabcd");
        assert_eq!(claim.claim_id, "170xabcdlock");
        assert_eq!(claim.validator, "0xvalidator");
    }

    #[test]
    fn native_mismatch_should_be_rejected() {
        let event = lock_event("", "usdt", U256::one());
        assert!(matches!(
            build_claim(&evm_source(), &event, 6, "v"),
            Err(Error::NativeAddressMismatch { .. })
        ));
        let event = lock_event("0x1234", "eth", U256::one());
        assert!(matches!(
            build_claim(&evm_source(), &event, 18, "v"),
            Err(Error::NativeAddressMismatch { .. })
        ));
    }

    #[test]
    fn content_key_should_ignore_validator() {
        let event = lock_event("0x1234", "USDT", U256::from(5_000_000u64));
        let a = build_claim(&evm_source(), &event, 6, "a").unwrap();
        let b = build_claim(&evm_source(), &event, 6, "b").unwrap();
        assert_eq!(a.claim_id, b.claim_id);
        assert_eq!(a.content.content_key(), b.content.content_key());
        assert_eq!(a.relay_id, event.relay_claim_id());
        assert_eq!(a.relay_id, b.relay_id);
        assert_eq!(a.content.asset(), "usdt0x1234");
    }

    #[test]
    fn claim_serde_should_work() {
        let event = lock_event("0x1234", "usdt", U256::from(5u64));
        let claim = build_claim(&evm_source(), &event, 8, "a").unwrap();
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["amount"], "5");
        assert_eq!(json["claimType"], "lock");
        let back: Claim = serde_json::from_value(json).unwrap();
        assert_eq!(back, claim);
    }
}
