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

use bridge_claim_codec::amount::decimal_string;
use bridge_claim_codec::{Claim, ClaimType, WitnessedEvent, CLAIM_DECIMALS};
use bridge_relayer_store::OracleStore;
use ethers::types::{H256, U256};
use ethers::utils::keccak256;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::effect::ClaimEffectApplier;
use crate::keeper::{OracleKeeper, VoteOutcome};
use crate::ledger::{Ledger, LedgerBatch};

/// Ledger record of the last emitted event nonce.
const NONCE_RECORD: &str = "bridge/nonce";

fn event_record(nonce: u64) -> String {
    format!("bridge/event/{nonce}")
}

/// A lock or burn asked by a user of the prophecy chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// The prophecy chain account paying.
    pub sender: String,
    /// The EVM receiver.
    pub receiver: String,
    /// The EVM token the asset maps to.
    pub token: String,
    /// The asset symbol.
    pub symbol: String,
    /// Amount in claim decimals.
    #[serde(with = "decimal_string")]
    pub amount: U256,
}

/// The user actions of the bridge executor, as exposed over HTTP.
pub trait BridgeActions: Send + Sync {
    /// See [`Bridge::lock`].
    fn lock(&self, request: &TransferRequest) -> crate::Result<WitnessedEvent>;
    /// See [`Bridge::burn`].
    fn burn(&self, request: &TransferRequest) -> crate::Result<WitnessedEvent>;
}

/// The bridge executor of the prophecy chain.
///
/// Claims from the EVM side go through the [`OracleKeeper`]; the winning one
/// is applied exactly once. Users of the prophecy chain lock and burn through
/// it too, which appends to its event log, relayed to the EVM side. The event
/// nonce and log live in the ledger, committed with the balance change.
#[derive(Clone)]
pub struct Bridge<S, L> {
    keeper: OracleKeeper<S>,
    effects: ClaimEffectApplier<L>,
    emitting: Arc<Mutex<()>>,
}

impl<S, L> std::fmt::Debug for Bridge<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish()
    }
}

impl<S: OracleStore, L: Ledger> Bridge<S, L> {
    /// Creates the executor; locked assets are held by `escrow`.
    pub fn new(keeper: OracleKeeper<S>, ledger: L, escrow: impl Into<String>) -> Self {
        Self {
            keeper,
            effects: ClaimEffectApplier::new(ledger, escrow, CLAIM_DECIMALS),
            emitting: Arc::new(Mutex::new(())),
        }
    }

    /// The oracle keeper.
    pub fn keeper(&self) -> &OracleKeeper<S> {
        &self.keeper
    }

    /// The ledger effects are applied to.
    pub fn ledger(&self) -> &L {
        self.effects.ledger()
    }

    /// Registers the claim and applies it if this vote made it succeed.
    #[tracing::instrument(skip_all, fields(claim_id = %claim.claim_id))]
    pub fn process_claim(&self, claim: &Claim) -> crate::Result<VoteOutcome> {
        let outcome = self
            .keeper
            .register_vote_then(claim, |final_claim| self.effects.apply(final_claim))?;
        if outcome.succeeded_now() {
            tracing::info!(claim_id = %claim.claim_id, "claim applied");
        }
        Ok(outcome)
    }

    /// Nonce of the last emitted event, zero before the first one.
    pub fn last_nonce(&self) -> crate::Result<u64> {
        let raw = self.ledger().record(NONCE_RECORD)?;
        Ok(raw
            .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
            .map(u64::from_be_bytes)
            .unwrap_or_default())
    }

    /// The event emitted with `nonce`.
    pub fn event(&self, nonce: u64) -> crate::Result<Option<WitnessedEvent>> {
        match self.ledger().record(&event_record(nonce))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` events with a nonce above `after`, in nonce order.
    pub fn events_after(
        &self,
        after: u64,
        limit: usize,
    ) -> crate::Result<Vec<WitnessedEvent>> {
        let last = self.last_nonce()?;
        let mut events = Vec::new();
        for nonce in (after + 1..=last).take(limit) {
            if let Some(event) = self.event(nonce)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Commits `batch` together with the next event.
    fn emit(
        &self,
        batch: LedgerBatch,
        claim_type: ClaimType,
        request: &TransferRequest,
    ) -> crate::Result<WitnessedEvent> {
        let _guard = self.emitting.lock();
        let nonce = self.last_nonce()? + 1;
        let tx_hash = H256::from(keccak256(
            format!("{claim_type}{nonce}{}{}", request.sender, request.receiver)
                .as_bytes(),
        ));
        let event = WitnessedEvent {
            claim_type,
            tx_hash,
            sender: request.sender.clone(),
            receiver: request.receiver.clone(),
            token: request.token.to_lowercase(),
            symbol: request.symbol.to_lowercase(),
            amount: request.amount,
            nonce,
        };
        let batch = batch
            .record(NONCE_RECORD, nonce.to_be_bytes().to_vec())
            .record(event_record(nonce), serde_json::to_vec(&event)?);
        self.ledger().commit(batch)?;
        tracing::info!(nonce, %claim_type, "bridge event emitted");
        Ok(event)
    }

    /// Locks a native asset of the prophecy chain into the escrow, to be
    /// minted on the EVM side as the token `token`.
    #[tracing::instrument(skip(self))]
    pub fn lock(
        &self,
        sender: &str,
        receiver: &str,
        token: &str,
        symbol: &str,
        amount: U256,
    ) -> crate::Result<WitnessedEvent> {
        self.lock_request(&TransferRequest {
            sender: sender.to_owned(),
            receiver: receiver.to_owned(),
            token: token.to_owned(),
            symbol: symbol.to_owned(),
            amount,
        })
    }

    fn lock_request(&self, request: &TransferRequest) -> crate::Result<WitnessedEvent> {
        let asset = request.symbol.to_lowercase();
        let batch = LedgerBatch::new()
            .debit(&request.sender, &asset, request.amount)
            .credit(self.effects.escrow(), &asset, request.amount);
        self.emit(batch, ClaimType::Lock, request)
    }

    /// Burns the bridged representation of an EVM asset, to be released on
    /// the EVM side.
    #[tracing::instrument(skip(self))]
    pub fn burn(
        &self,
        sender: &str,
        receiver: &str,
        token: &str,
        symbol: &str,
        amount: U256,
    ) -> crate::Result<WitnessedEvent> {
        self.burn_request(&TransferRequest {
            sender: sender.to_owned(),
            receiver: receiver.to_owned(),
            token: token.to_owned(),
            symbol: symbol.to_owned(),
            amount,
        })
    }

    fn burn_request(&self, request: &TransferRequest) -> crate::Result<WitnessedEvent> {
        let asset = format!("{}{}", request.symbol, request.token).to_lowercase();
        let batch = LedgerBatch::new().debit(&request.sender, &asset, request.amount);
        self.emit(batch, ClaimType::Burn, request)
    }
}

impl<S, L> BridgeActions for Bridge<S, L>
where
    S: OracleStore,
    L: Ledger,
{
    fn lock(&self, request: &TransferRequest) -> crate::Result<WitnessedEvent> {
        self.lock_request(request)
    }

    fn burn(&self, request: &TransferRequest) -> crate::Result<WitnessedEvent> {
        self.burn_request(request)
    }
}

#[cfg(test)]
mod tests {
    use bridge_claim_codec::ClaimContent;
    use bridge_relayer_store::{InMemoryStore, SledStore};

    use super::*;
    use crate::ledger::{InMemoryLedger, StoreLedger};
    use crate::prophecy::ProphecyStatus;
    use crate::OracleError;

    fn bridge() -> Bridge<InMemoryStore, InMemoryLedger> {
        let keeper = OracleKeeper::new(InMemoryStore::default());
        keeper.add_validator("a", 80).unwrap();
        keeper.add_validator("b", 10).unwrap();
        keeper.add_validator("c", 10).unwrap();
        Bridge::new(keeper, InMemoryLedger::default(), "escrow")
    }

    fn lock_claim(validator: &str) -> Claim {
        Claim::new(
            ClaimContent {
                claim_type: ClaimType::Lock,
                source_chain_id: 1,
                bridge_contract: "0xbank".into(),
                nonce: 1,
                sender: "0xsender".into(),
                receiver: "1receiver".into(),
                token: String::new(),
                symbol: "eth".into(),
                amount: U256::from(100u64),
            },
            validator,
        )
    }

    #[test]
    #[tracing_test::traced_test]
    fn effect_should_apply_exactly_once() {
        let bridge = bridge();
        let outcome = bridge.process_claim(&lock_claim("a")).unwrap();
        assert_eq!(outcome.status, ProphecyStatus::Success);
        for v in ["b", "c"] {
            let late = bridge.process_claim(&lock_claim(v)).unwrap();
            assert!(!late.completed_now);
        }
        assert!(matches!(
            bridge.process_claim(&lock_claim("a")),
            Err(OracleError::DuplicateVote { .. })
        ));
        assert_eq!(bridge.ledger().balance("1receiver", "eth").unwrap(), U256::from(100u64));
        assert!(logs_contain("claim applied"));
    }

    #[test]
    fn lock_and_burn_should_emit_events() {
        let bridge = bridge();
        bridge.ledger().mint("alice", "bty", 1_000u64.into()).unwrap();
        let lock = bridge
            .lock("alice", "0xreceiver", "0xBtyToken", "BTY", 600u64.into())
            .unwrap();
        assert_eq!(lock.claim_type, ClaimType::Lock);
        assert_eq!(lock.nonce, 1);
        assert_eq!(lock.symbol, "bty");
        assert_eq!(bridge.ledger().balance("escrow", "bty").unwrap(), U256::from(600u64));

        bridge.process_claim(&lock_claim("a")).unwrap();
        let burn = bridge
            .burn("1receiver", "0xsender", "", "eth", 40u64.into())
            .unwrap();
        assert_eq!(burn.nonce, 2);
        assert_eq!(bridge.ledger().balance("1receiver", "eth").unwrap(), U256::from(60u64));
        assert!(bridge
            .burn("1receiver", "0xsender", "", "eth", 61u64.into())
            .is_err());
        // a rejected burn takes no nonce.
        assert_eq!(bridge.last_nonce().unwrap(), 2);
        assert_eq!(bridge.events_after(0, 10).unwrap(), vec![lock.clone(), burn]);
        assert_eq!(bridge.events_after(1, 1).unwrap().len(), 1);
        assert_eq!(bridge.event(1).unwrap(), Some(lock));
    }

    #[test]
    fn nonce_and_events_should_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let request = TransferRequest {
            sender: "alice".into(),
            receiver: "0xreceiver".into(),
            token: "0xbtytoken".into(),
            symbol: "bty".into(),
            amount: 10u64.into(),
        };
        let open = || {
            let store = SledStore::open(tmp.path()).unwrap();
            Bridge::new(OracleKeeper::new(store.clone()), StoreLedger::new(store), "escrow")
        };
        {
            let bridge = open();
            bridge.ledger().mint("alice", "bty", 100u64.into()).unwrap();
            BridgeActions::lock(&bridge, &request).unwrap();
            BridgeActions::lock(&bridge, &request).unwrap();
        }
        let bridge = open();
        assert_eq!(bridge.last_nonce().unwrap(), 2);
        let third = BridgeActions::lock(&bridge, &request).unwrap();
        assert_eq!(third.nonce, 3);
        assert_ne!(bridge.event(2).unwrap().unwrap().tx_hash, third.tx_hash);
        assert_eq!(bridge.ledger().balance("escrow", "bty").unwrap(), U256::from(30u64));
        assert_eq!(bridge.ledger().balance("alice", "bty").unwrap(), U256::from(70u64));
    }
}
