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

use bridge_claim_codec::{Claim, ClaimContent};
use bridge_relayer_store::OracleStore;
use bridge_relayer_utils::probe;
use parking_lot::Mutex;

use crate::prophecy::{Prophecy, ProphecyStatus};
use crate::validator::{
    is_valid_percent, normalize_address, power_of, total_power, Validator,
};
use crate::OracleError;

/// The threshold used until one is set.
pub const DEFAULT_CONSENSUS_THRESHOLD: u64 = 70;

/// What a vote did to its prophecy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Status after the vote.
    pub status: ProphecyStatus,
    /// The winning content, when the prophecy succeeded.
    pub final_claim: Option<ClaimContent>,
    /// Whether this very vote moved the prophecy out of pending.
    pub completed_now: bool,
}

impl VoteOutcome {
    /// Whether this vote is the one transition into success.
    pub fn succeeded_now(&self) -> bool {
        self.completed_now && self.status == ProphecyStatus::Success
    }
}

/// The oracle state machine over an [`OracleStore`].
///
/// Every mutation runs under one lock, so the read-modify-write of a
/// prophecy or of the validator set never interleaves.
#[derive(Clone)]
pub struct OracleKeeper<S> {
    store: S,
    lock: Arc<Mutex<()>>,
}

impl<S> std::fmt::Debug for OracleKeeper<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleKeeper").finish()
    }
}

fn same_identity(a: &ClaimContent, b: &ClaimContent) -> bool {
    a.claim_type == b.claim_type
        && a.source_chain_id == b.source_chain_id
        && a.nonce == b.nonce
        && a.sender == b.sender
        && a.token == b.token
}

impl<S: OracleStore> OracleKeeper<S> {
    /// Creates a keeper over the store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The validator set, empty when none was registered.
    pub fn validators(&self) -> crate::Result<Vec<Validator>> {
        Ok(self.store.get_validators()?.unwrap_or_default())
    }

    /// Sum of the validators' power.
    pub fn total_power(&self) -> crate::Result<u64> {
        Ok(self.store.get_total_power()?.unwrap_or_default())
    }

    /// The consensus threshold, in percent.
    pub fn consensus_threshold(&self) -> crate::Result<u64> {
        Ok(self
            .store
            .get_consensus_threshold()?
            .unwrap_or(DEFAULT_CONSENSUS_THRESHOLD))
    }

    /// Reads a prophecy.
    pub fn prophecy(&self, claim_id: &str) -> crate::Result<Option<Prophecy>> {
        Ok(self.store.get_prophecy(claim_id)?)
    }

    fn save_validators(&self, validators: &[Validator]) -> crate::Result<()> {
        let total = total_power(validators);
        self.store
            .put_validators_and_total_power(&validators, total)?;
        Ok(())
    }

    /// Adds a validator; its address must be new.
    #[tracing::instrument(skip(self))]
    pub fn add_validator(&self, address: &str, power: u64) -> crate::Result<()> {
        let validator = Validator::new(address, power)?;
        let _guard = self.lock.lock();
        let mut validators = self.validators()?;
        if power_of(&validators, &validator.address).is_some() {
            return Err(OracleError::AddressExists(validator.address));
        }
        validators.push(validator);
        self.save_validators(&validators)
    }

    /// Removes a validator; it must be in the set.
    #[tracing::instrument(skip(self))]
    pub fn remove_validator(&self, address: &str) -> crate::Result<()> {
        let address = normalize_address(address);
        let _guard = self.lock.lock();
        let mut validators = self.validators()?;
        let before = validators.len();
        validators.retain(|v| v.address != address);
        if validators.len() == before {
            return Err(OracleError::AddressNotExist(address));
        }
        self.save_validators(&validators)
    }

    /// Changes the power of a validator; it must be in the set.
    #[tracing::instrument(skip(self))]
    pub fn modify_power(&self, address: &str, power: u64) -> crate::Result<()> {
        let updated = Validator::new(address, power)?;
        let _guard = self.lock.lock();
        let mut validators = self.validators()?;
        let slot = validators
            .iter_mut()
            .find(|v| v.address == updated.address)
            .ok_or_else(|| {
                OracleError::AddressNotExist(updated.address.clone())
            })?;
        slot.power = updated.power;
        self.save_validators(&validators)
    }

    /// Sets the consensus threshold. Terminal prophecies are not reopened.
    #[tracing::instrument(skip(self))]
    pub fn set_consensus_threshold(&self, threshold: u64) -> crate::Result<()> {
        if !is_valid_percent(threshold) {
            return Err(OracleError::InvalidThreshold(threshold));
        }
        let _guard = self.lock.lock();
        self.store.put_consensus_threshold(threshold)?;
        Ok(())
    }

    /// Registers a vote.
    pub fn register_vote(&self, claim: &Claim) -> crate::Result<VoteOutcome> {
        self.register_vote_then(claim, |_| Ok(()))
    }

    /// Registers a vote and, on the transition into success, runs `on_success`
    /// with the final claim before the prophecy is persisted. When
    /// `on_success` fails nothing is persisted and the vote is rejected.
    #[tracing::instrument(
        skip_all,
        fields(claim_id = %claim.claim_id, validator = %claim.validator),
    )]
    pub fn register_vote_then<F>(
        &self,
        claim: &Claim,
        on_success: F,
    ) -> crate::Result<VoteOutcome>
    where
        F: FnOnce(&ClaimContent) -> crate::Result<()>,
    {
        let validator = normalize_address(&claim.validator);
        let _guard = self.lock.lock();
        let validators = self.validators()?;
        if validators.is_empty() {
            return Err(OracleError::EmptyValidatorSet);
        }
        if power_of(&validators, &validator).is_none() {
            return Err(OracleError::UnknownValidator(validator));
        }
        let Some(mut prophecy) =
            self.store.get_prophecy::<Prophecy>(&claim.claim_id)?
        else {
            // an unseen claim id only opens a prophecy for matching content.
            if claim.claim_id != claim.content.oracle_id() {
                return Err(OracleError::ClaimInconsistent(
                    claim.claim_id.clone(),
                ));
            }
            return self.vote_pending(
                Prophecy::new(claim.claim_id.clone()),
                claim,
                validator,
                &validators,
                on_success,
            );
        };

        if self.is_inconsistent(&prophecy, claim)? {
            if prophecy.status == ProphecyStatus::Pending {
                prophecy.status = ProphecyStatus::Failed;
                self.store.put_prophecy(&prophecy.id, &prophecy)?;
                tracing::warn!(
                    target: probe::TARGET,
                    kind = %probe::Kind::Oracle,
                    claim_id = %prophecy.id,
                    status = %prophecy.status,
                    "inconsistent claim failed the prophecy",
                );
            }
            return Err(OracleError::ClaimInconsistent(claim.claim_id.clone()));
        }

        match prophecy.status {
            ProphecyStatus::Failed => {
                return Err(OracleError::ProphecyFinalized(prophecy.id));
            }
            ProphecyStatus::Success => {
                if prophecy.has_voted(&validator) {
                    return Err(OracleError::DuplicateVote {
                        validator,
                        claim_id: prophecy.id,
                    });
                }
                tracing::debug!(
                    claim_id = %prophecy.id,
                    "late vote on a successful prophecy ignored",
                );
                return Ok(VoteOutcome {
                    status: prophecy.status,
                    final_claim: prophecy.final_claim,
                    completed_now: false,
                });
            }
            ProphecyStatus::Pending => {}
        }
        self.vote_pending(prophecy, claim, validator, &validators, on_success)
    }

    fn vote_pending<F>(
        &self,
        mut prophecy: Prophecy,
        claim: &Claim,
        validator: String,
        validators: &[Validator],
        on_success: F,
    ) -> crate::Result<VoteOutcome>
    where
        F: FnOnce(&ClaimContent) -> crate::Result<()>,
    {
        if prophecy.has_voted(&validator) {
            return Err(OracleError::DuplicateVote {
                validator,
                claim_id: prophecy.id,
            });
        }

        prophecy.add_vote(&validator, &claim.content.content_key());
        let total = self.total_power()?;
        let threshold = self.consensus_threshold()?;
        let status = prophecy.recompute(validators, total, threshold)?;
        let completed_now = status.is_terminal();
        if status == ProphecyStatus::Success {
            if let Some(final_claim) = &prophecy.final_claim {
                on_success(final_claim)?;
            }
        }
        self.store.put_prophecy(&prophecy.id, &prophecy)?;
        if completed_now {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Oracle,
                claim_id = %prophecy.id,
                status = %status,
            );
        }
        Ok(VoteOutcome {
            status,
            final_claim: prophecy.final_claim,
            completed_now,
        })
    }

    fn is_inconsistent(
        &self,
        prophecy: &Prophecy,
        claim: &Claim,
    ) -> crate::Result<bool> {
        if claim.claim_id != claim.content.oracle_id() {
            return Ok(true);
        }
        match prophecy.recorded_content() {
            Some(recorded) => {
                let recorded: ClaimContent = serde_json::from_str(recorded)?;
                Ok(!same_identity(&recorded, &claim.content))
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use bridge_claim_codec::ClaimType;
    use bridge_relayer_store::InMemoryStore;
    use ethers::types::U256;

    use super::*;

    fn keeper(threshold: u64) -> OracleKeeper<InMemoryStore> {
        let keeper = OracleKeeper::new(InMemoryStore::default());
        keeper.add_validator("A", 80).unwrap();
        keeper.add_validator("B", 10).unwrap();
        keeper.add_validator("C", 10).unwrap();
        keeper.set_consensus_threshold(threshold).unwrap();
        keeper
    }

    fn claim(validator: &str, amount: u64) -> Claim {
        Claim::new(
            ClaimContent {
                claim_type: ClaimType::Lock,
                source_chain_id: 1,
                bridge_contract: "0xbank".into(),
                nonce: 5,
                sender: "0xsender".into(),
                receiver: "1receiver".into(),
                token: String::new(),
                symbol: "eth".into(),
                amount: U256::from(amount),
            },
            validator,
        )
    }

    #[test]
    fn validator_set_mutations_should_work() {
        let keeper = keeper(70);
        assert_eq!(keeper.total_power().unwrap(), 100);
        assert!(matches!(
            keeper.add_validator("a", 5),
            Err(OracleError::AddressExists(_))
        ));
        assert!(matches!(
            keeper.remove_validator("d"),
            Err(OracleError::AddressNotExist(_))
        ));
        assert!(matches!(
            keeper.modify_power("d", 5),
            Err(OracleError::AddressNotExist(_))
        ));
        keeper.modify_power("b", 20).unwrap();
        assert_eq!(keeper.total_power().unwrap(), 110);
        keeper.remove_validator("c").unwrap();
        assert_eq!(keeper.total_power().unwrap(), 100);
        assert_eq!(keeper.validators().unwrap().len(), 2);
    }

    #[test]
    fn threshold_should_be_validated() {
        let keeper = OracleKeeper::new(InMemoryStore::default());
        assert_eq!(keeper.consensus_threshold().unwrap(), 70);
        assert!(matches!(
            keeper.set_consensus_threshold(0),
            Err(OracleError::InvalidThreshold(0))
        ));
        assert!(matches!(
            keeper.set_consensus_threshold(101),
            Err(OracleError::InvalidThreshold(101))
        ));
        keeper.set_consensus_threshold(100).unwrap();
        assert_eq!(keeper.consensus_threshold().unwrap(), 100);
    }

    #[test]
    fn unknown_validator_should_be_rejected() {
        let empty = OracleKeeper::new(InMemoryStore::default());
        assert!(matches!(
            empty.register_vote(&claim("a", 100)),
            Err(OracleError::EmptyValidatorSet)
        ));
        let keeper = keeper(70);
        assert!(matches!(
            keeper.register_vote(&claim("z", 100)),
            Err(OracleError::UnknownValidator(_))
        ));
    }

    #[test]
    fn single_vote_success_should_work() {
        let keeper = keeper(70);
        let outcome = keeper.register_vote(&claim("a", 100)).unwrap();
        assert!(outcome.succeeded_now());
        assert_eq!(outcome.final_claim.unwrap().amount, U256::from(100u64));

        // later identical votes are no-ops.
        let late = keeper.register_vote(&claim("b", 100)).unwrap();
        assert_eq!(late.status, ProphecyStatus::Success);
        assert!(!late.completed_now);
        assert!(matches!(
            keeper.register_vote(&claim("a", 100)),
            Err(OracleError::DuplicateVote { .. })
        ));
    }

    #[test]
    fn duplicate_vote_should_be_rejected() {
        let keeper = keeper(90);
        let first = keeper.register_vote(&claim("b", 100)).unwrap();
        assert_eq!(first.status, ProphecyStatus::Pending);
        assert!(matches!(
            keeper.register_vote(&claim("b", 100)),
            Err(OracleError::DuplicateVote { .. })
        ));
        let prophecy = keeper.prophecy(&claim("b", 100).claim_id).unwrap().unwrap();
        assert_eq!(prophecy.votes_by_validator.len(), 1);
    }

    #[test]
    fn failed_prophecy_should_be_final() {
        let keeper = keeper(90);
        keeper.register_vote(&claim("a", 100)).unwrap();
        keeper.register_vote(&claim("b", 200)).unwrap();
        let outcome = keeper.register_vote(&claim("c", 200)).unwrap();
        assert_eq!(outcome.status, ProphecyStatus::Failed);
        assert!(outcome.completed_now);
        keeper.modify_power("a", 100).unwrap();
        assert!(matches!(
            keeper.register_vote(&claim("a", 100)),
            Err(OracleError::ProphecyFinalized(_))
        ));
    }

    #[test]
    fn inconsistent_claim_should_fail_prophecy() {
        let keeper = keeper(90);
        keeper.register_vote(&claim("b", 100)).unwrap();
        let mut bad = claim("c", 100);
        bad.content.nonce = 6;
        assert!(matches!(
            keeper.register_vote(&bad),
            Err(OracleError::ClaimInconsistent(_))
        ));
        let prophecy = keeper.prophecy(&bad.claim_id).unwrap().unwrap();
        assert_eq!(prophecy.status, ProphecyStatus::Failed);
    }

    #[test]
    fn inconsistent_first_vote_should_not_open_prophecy() {
        let keeper = keeper(70);
        let honest = claim("a", 100);
        let mut bad = claim("c", 100);
        bad.content.nonce = 6;
        assert_eq!(bad.claim_id, honest.claim_id);
        assert!(matches!(
            keeper.register_vote(&bad),
            Err(OracleError::ClaimInconsistent(_))
        ));
        assert_eq!(keeper.prophecy(&honest.claim_id).unwrap(), None);

        let outcome = keeper.register_vote(&honest).unwrap();
        assert!(outcome.succeeded_now());
    }

    #[test]
    fn failed_effect_should_not_persist_vote() {
        let keeper = keeper(70);
        let c = claim("a", 100);
        let res = keeper.register_vote_then(&c, |_| {
            Err(OracleError::BalanceOverflow {
                account: "1receiver".into(),
                asset: "eth".into(),
            })
        });
        assert!(res.is_err());
        assert_eq!(keeper.prophecy(&c.claim_id).unwrap(), None);
        let mut applied = 0;
        let outcome = keeper
            .register_vote_then(&c, |_| {
                applied += 1;
                Ok(())
            })
            .unwrap();
        assert!(outcome.succeeded_now());
        assert_eq!(applied, 1);
    }
}
