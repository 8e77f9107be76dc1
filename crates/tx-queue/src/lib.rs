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

//! # Relayer Transaction Queue Module 🕸️
//!
//! Sends claims to the destination chain and follows them until they are mined.
//!
//! ## Overview
//!
//! A [`Submitter`] signs and broadcasts one claim carrying transaction per
//! call, allocating gap-free account nonces through its [`NonceManager`].
//! Every broadcast transaction is appended to the submission log of its
//! direction, which the [`TxStatusTracker`] resolves strictly in order.
#![warn(missing_docs)]

/// Destination chain access needed to submit claims.
pub mod client;
/// Per-account nonce cache.
pub mod nonce;
/// Resolution of submitted transactions.
pub mod status;
/// Claim submission.
pub mod submitter;

pub use client::SubmitClient;
pub use nonce::{NonceManager, NonceState};
pub use status::TxStatusTracker;
pub use submitter::Submitter;

#[cfg(test)]
mod tests;
