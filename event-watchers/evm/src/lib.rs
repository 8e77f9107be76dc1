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

#![warn(missing_docs)]
//! # Relayer EVM Chain Module 🕸️
//!
//! Access to the EVM side of the bridge through [ethers].
//!
//! ## Overview
//!
//! * [`EvmChainClient`] reads the bridge bank logs, in block ranges or from a
//!   websocket log subscription, for the chain watcher.
//! * [`EvmSubmitClient`] signs and broadcasts `newOracleClaim` calls to the
//!   oracle contract, with the nonce handed out by the submitter.
//! * [`RegistryProbe`] tells whether the bridge contracts are deployed yet.
//! * [`TokenDecimals`] reads and caches the decimals of bridged tokens.

use bridge_relayer_utils::Error;
use ethers::contract::ContractError;
use ethers::providers::{Middleware, ProviderError};

/// Chain watcher access.
pub mod client;
/// Contract bindings.
pub mod contracts;
/// Token decimals lookup.
pub mod decimals;
/// Discovery of the bridge contracts.
pub mod registry;
/// Claim submission.
pub mod submit;

pub use client::EvmChainClient;
pub use decimals::TokenDecimals;
pub use registry::{BridgeContracts, RegistryProbe, RegistryState};
pub use submit::EvmSubmitClient;

/// Maps a contract call error into the relayer taxonomy.
///
/// A revert is an answer of the chain about this very call, so it is never
/// retried.
pub(crate) fn contract_error<M: Middleware>(e: ContractError<M>) -> Error {
    match e {
        ContractError::ProviderError { e } => Error::EthersProvider(e),
        ContractError::Revert(data) => {
            Error::Oracle(format!("call reverted: {data}"))
        }
        other => {
            Error::EthersProvider(ProviderError::CustomError(other.to_string()))
        }
    }
}

/// Parses an address given as text, empty meaning the zero address.
pub(crate) fn parse_address(
    value: &str,
) -> bridge_relayer_utils::Result<ethers::types::Address> {
    if value.is_empty() {
        return Ok(ethers::types::Address::zero());
    }
    value
        .parse()
        .map_err(|_| Error::Decode(format!("invalid evm address: {value}")))
}
