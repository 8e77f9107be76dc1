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

//! Common types shared between the bridge relayer crates.

#![warn(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A module for the private key type that can be read from the config or env.
pub mod private_key;
/// A module for the rpc url type that can be read from the config or env.
pub mod rpc_url;

pub use private_key::PrivateKey;
pub use rpc_url::RpcUrl;

/// Resolves a config value that may point to an environment variable.
///
/// Values starting with `$` are read from the environment, anything else is
/// returned as is.
pub(crate) fn resolve_env_value(value: &str) -> Result<String, String> {
    match value.strip_prefix('$') {
        Some(var) => {
            tracing::trace!("Reading {} from env", var);
            std::env::var(var).map_err(|e| {
                format!("error while loading this env {var}: {e}")
            })
        }
        None => Ok(value.to_owned()),
    }
}

/// The two kinds of ledgers the relayer bridges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// An EVM chain, where the bridge bank and oracle contracts live.
    Evm,
    /// The Tendermint-style chain running the prophecy executor.
    Tendermint,
}

impl ChainKind {
    /// The string used in store keys and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Evm => "evm",
            ChainKind::Tendermint => "tendermint",
        }
    }

    /// The other side of the bridge.
    pub const fn opposite(&self) -> Self {
        match self {
            ChainKind::Evm => ChainKind::Tendermint,
            ChainKind::Tendermint => ChainKind::Evm,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evm" | "ethereum" => Ok(ChainKind::Evm),
            "tendermint" | "chain33" => Ok(ChainKind::Tendermint),
            other => Err(format!("unknown chain kind: {other}")),
        }
    }
}

/// The direction of a relayed claim, named after where the event was witnessed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Events witnessed on the EVM chain, relayed to the Tendermint chain.
    EvmToTendermint,
    /// Events witnessed on the Tendermint chain, relayed to the EVM chain.
    TendermintToEvm,
}

impl Direction {
    /// The direction of claims witnessed on `source`.
    pub const fn from_source(source: ChainKind) -> Self {
        match source {
            ChainKind::Evm => Direction::EvmToTendermint,
            ChainKind::Tendermint => Direction::TendermintToEvm,
        }
    }

    /// Where the events are witnessed.
    pub const fn source(&self) -> ChainKind {
        match self {
            Direction::EvmToTendermint => ChainKind::Evm,
            Direction::TendermintToEvm => ChainKind::Tendermint,
        }
    }

    /// Where the claims are submitted.
    pub const fn destination(&self) -> ChainKind {
        self.source().opposite()
    }

    /// The string used in store keys and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::EvmToTendermint => "evm-to-tendermint",
            Direction::TendermintToEvm => "tendermint-to-evm",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evm-to-tendermint" => Ok(Direction::EvmToTendermint),
            "tendermint-to-evm" => Ok(Direction::TendermintToEvm),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Position of an event inside a chain: block height and index within the block.
///
/// The derived ordering is the processing order of events on one chain.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct EventLogIndex {
    /// Block height.
    pub height: u64,
    /// Index of the event within the block.
    pub index: u32,
}

impl EventLogIndex {
    /// Creates a new index.
    pub const fn new(height: u64, index: u32) -> Self {
        Self { height, index }
    }

    /// Big endian bytes, so that byte order equals event order.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[..8].copy_from_slice(&self.height.to_be_bytes());
        out[8..].copy_from_slice(&self.index.to_be_bytes());
        out
    }

    /// Reverse of [`EventLogIndex::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let height = u64::from_be_bytes(bytes.get(..8)?.try_into().ok()?);
        let index = u32::from_be_bytes(bytes.get(8..12)?.try_into().ok()?);
        Some(Self { height, index })
    }
}

impl fmt::Display for EventLogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.height, self.index)
    }
}

/// Finality status of a submitted transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum TxStatus {
    /// Not yet included, or included without enough confirmations.
    Pending,
    /// Included and executed successfully.
    Success,
    /// Included and reverted, or dropped.
    Failed,
}

impl TxStatus {
    /// Whether the status can still change.
    pub const fn is_pending(&self) -> bool {
        matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => f.write_str("Pending"),
            TxStatus::Success => f.write_str("Success"),
            TxStatus::Failed => f.write_str("Failed"),
        }
    }
}

/// A transaction broadcast by a submitter, waiting for its status to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    /// Strictly increasing per direction, starting at 1.
    pub index: u64,
    /// Hash of the broadcast transaction.
    pub tx_hash: String,
    /// Last known status.
    pub status: TxStatus,
    /// When the transaction was broadcast, in milliseconds since the epoch.
    #[serde(default)]
    pub submitted_at: u64,
}

impl PendingSubmission {
    /// A pending submission broadcast just now.
    pub fn new(index: u64, tx_hash: impl Into<String>) -> Self {
        Self {
            index,
            tx_hash: tx_hash.into(),
            status: TxStatus::Pending,
            submitted_at: unix_millis(),
        }
    }

    /// How long ago the transaction was broadcast.
    pub fn age(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            unix_millis().saturating_sub(self.submitted_at),
        )
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
