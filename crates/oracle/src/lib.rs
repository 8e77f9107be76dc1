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

//! # Bridge Oracle Module 🕸️
//!
//! Weighted majority consensus over validator claims, and the effects applied
//! once a claim wins.
//!
//! ## Overview
//!
//! Every validator casts one vote per claim id. The [`OracleKeeper`] groups the
//! votes by content, weights them with the validators' power and flips the
//! [`Prophecy`] to success once the leading content reaches the consensus
//! threshold, or to failure once no remaining power can make it reach it.
//!
//! The [`Bridge`] plays the role of the bridge executor of the prophecy chain:
//! it feeds claims to the keeper and, on the one transition into success,
//! hands the final claim to the [`ClaimEffectApplier`].
#![warn(missing_docs)]

/// The bridge executor and its user actions.
pub mod bridge;
/// Effects of successful claims.
pub mod effect;
/// Vote bookkeeping and consensus.
pub mod keeper;
/// Balances the effects act on.
pub mod ledger;
/// Prophecies and the completion rule.
pub mod prophecy;
/// Read access to the oracle state, wherever it lives.
pub mod query;
/// Validators and their power.
pub mod validator;

pub use bridge::{Bridge, BridgeActions, TransferRequest};
pub use effect::ClaimEffectApplier;
pub use keeper::{OracleKeeper, VoteOutcome, DEFAULT_CONSENSUS_THRESHOLD};
pub use ledger::{InMemoryLedger, Ledger, LedgerBatch, StoreLedger};
pub use prophecy::{Prophecy, ProphecyStatus};
pub use query::{OracleQuery, ProphecyView};
pub use validator::Validator;

/// Typed failures of the oracle, surfaced to the executor as protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The vote comes from an address outside the validator set.
    #[error("Unknown validator: {0}")]
    UnknownValidator(String),
    /// The claim contradicts what the prophecy recorded so far.
    #[error("Claim inconsistent with prophecy {0}")]
    ClaimInconsistent(String),
    /// The validator already voted on this prophecy.
    #[error("Duplicate vote of {validator} on prophecy {claim_id}")]
    DuplicateVote {
        /// The voting validator.
        validator: String,
        /// The prophecy voted on.
        claim_id: String,
    },
    /// The prophecy already failed and takes no more votes.
    #[error("Prophecy {0} is already finalized")]
    ProphecyFinalized(String),
    /// Adding a validator that is already in the set.
    #[error("Validator {0} already exists")]
    AddressExists(String),
    /// Removing or modifying a validator that is not in the set.
    #[error("Validator {0} does not exist")]
    AddressNotExist(String),
    /// Power outside of `(0, 100]`.
    #[error("Invalid validator power {0}, expected a value in (0, 100]")]
    InvalidPower(u64),
    /// Threshold outside of `(0, 100]`.
    #[error("Invalid consensus threshold {0}, expected a value in (0, 100]")]
    InvalidThreshold(u64),
    /// No validator is registered yet.
    #[error("The validator set is empty")]
    EmptyValidatorSet,
    /// An account does not hold enough of an asset.
    #[error("Insufficient balance of {asset} for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        /// The debited account.
        account: String,
        /// The asset debited.
        asset: String,
        /// The requested amount.
        needed: String,
        /// The current balance.
        available: String,
    },
    /// A credit would overflow the balance.
    #[error("Balance overflow of {asset} for {account}")]
    BalanceOverflow {
        /// The credited account.
        account: String,
        /// The asset credited.
        asset: String,
    },
    /// Persistence or amount scaling failed underneath the oracle.
    #[error(transparent)]
    Store(#[from] bridge_relayer_utils::Error),
    /// A stored record could not be read back.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Oracle results.
pub type Result<T> = std::result::Result<T, OracleError>;

impl From<OracleError> for bridge_relayer_utils::Error {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::Store(e) => e,
            OracleError::Json(e) => bridge_relayer_utils::Error::Json(e),
            other => bridge_relayer_utils::Error::Oracle(other.to_string()),
        }
    }
}
