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
//! # Relayer Tendermint Chain Module 🕸️
//!
//! Access to the Chain33 style side of the bridge over its JSON-RPC API.
//!
//! ## Overview
//!
//! * [`TendermintChainClient`] reads the receipts of the bridge executor,
//!   block range by block range, for the chain watcher.
//! * [`TendermintSubmitClient`] has the node create the
//!   `Eth2Chain33Lock` and `Eth2Chain33Burn` actions, signs them locally and
//!   sends them.
//! * [`RemoteOracle`] answers the oracle queries from the node when the
//!   prophecy state lives on chain.

/// Chain watcher access.
pub mod client;
/// Oracle queries against the node.
pub mod oracle;
/// The JSON-RPC transport.
pub mod rpc;
mod sign;
/// Claim submission.
pub mod submit;
mod types;

pub use client::TendermintChainClient;
pub use oracle::RemoteOracle;
pub use rpc::JsonRpcClient;
pub use submit::TendermintSubmitClient;

#[cfg(test)]
mod tests;
