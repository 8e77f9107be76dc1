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

//! # Claim Codec Module 🕸️
//!
//! Pure functions turning a witnessed lock or burn event into a canonical
//! [`Claim`].
//!
//! ## Overview
//!
//! Both chains emit their bridge events in their own shape. The codec decodes
//! them into a [`WitnessedEvent`], then [`build_claim`] canonicalizes it: the
//! symbol is lower-cased, the amount is normalized to 8 decimals and the
//! oracle id is derived from the claim identity. Nothing here keeps state or
//! retries; every error is a permanent input error.
#![warn(missing_docs)]

/// Decimal normalization of amounts.
pub mod amount;
/// Claims and the events they are built from.
pub mod claim;
/// EVM bridge bank events.
pub mod evm;
/// Claim id constructions.
pub mod id;
/// Tendermint-style receipt logs.
pub mod tendermint;

pub use amount::{denormalize_amount, normalize_amount, CLAIM_DECIMALS};
pub use claim::{
    build_claim, is_native_token, Claim, ClaimContent, ClaimType, SourceContext,
    WitnessedEvent, NATIVE_DECIMALS, NATIVE_SYMBOL,
};
pub use id::{build_oracle_id, build_relay_claim_id};

/// Codec results share the relayer error type.
pub type Result<T> = bridge_relayer_utils::Result<T>;
