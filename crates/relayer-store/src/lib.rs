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

//! # Relayer Store Module 🕸️
//!
//! A module for managing the storage of the relayer.
//!
//! ## Overview
//!
//! The relayer store keeps everything that must survive a restart: the sync
//! cursors of the chain watchers, the buffered event logs, the processed
//! transaction markers, the submitted transactions of every direction and the
//! oracle state (prophecies, validator set, total power and threshold).
//!
//! Every component writes only into its own namespace, so no cross-namespace
//! transactions are needed.
#![warn(missing_docs)]

use std::fmt::{Debug, Display};

use bridge_relayer_types::{
    ChainKind, Direction, EventLogIndex, PendingSubmission, TxStatus,
};
use bridge_relayer_utils::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A module for managing in-memory storage of the relayer.
pub mod mem;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
#[cfg(feature = "sled")]
pub mod sled;

/// A store that uses [`sled`](https://sled.rs) as the backend.
#[cfg(feature = "sled")]
pub use self::sled::SledStore;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// HistoryStoreKey identifies the chain a watcher is syncing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct HistoryStoreKey {
    /// Which side of the bridge.
    pub kind: ChainKind,
    /// The chain id of that side.
    pub chain_id: u32,
}

impl HistoryStoreKey {
    /// Creates a new key.
    pub const fn new(kind: ChainKind, chain_id: u32) -> Self {
        Self { kind, chain_id }
    }

    /// Returns the bytes of the key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(1 + 4);
        vec.push(match self.kind {
            ChainKind::Evm => 0u8,
            ChainKind::Tendermint => 1u8,
        });
        vec.extend_from_slice(&self.chain_id.to_be_bytes());
        vec
    }
}

impl Display for HistoryStoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, self.chain_id)
    }
}

impl From<(ChainKind, u32)> for HistoryStoreKey {
    fn from((kind, chain_id): (ChainKind, u32)) -> Self {
        Self { kind, chain_id }
    }
}

/// HistoryStore is a simple trait for storing and retrieving history
/// of block numbers.
///
/// The last block number is the height up to which events were fetched into the
/// event log, the target block number is the chain head seen last.
pub trait HistoryStore: Clone + Send + Sync {
    /// Sets the new block number for that chain in the cache and returns the old one.
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64>;
    /// Get the last block number for that chain.
    /// if not found, returns the `default_block_number`.
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64>;

    /// an easy way to call the `get_last_block_number`
    /// where the default block number is `0`.
    fn get_last_block_number_or_default<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> crate::Result<u64> {
        self.get_last_block_number(key, 0u64)
    }

    /// Sets the Target Block number (Usually the latest block number of the target chain)
    /// This used to be able to check if we are fully synced with the target chain or not.
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64>;
    /// Get the target block number.
    /// if not found, returns the `default_block_number`.
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64>;

    /// an easy way to call the `get_target_block_number`.
    fn get_target_block_number_or_default<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> crate::Result<u64> {
        self.get_target_block_number(key, 0u64)
    }
}

/// The crash-safe progress cursor of a chain watcher (`cursor:<chain>`).
///
/// It always points at the last fully processed event.
pub trait SyncCursorStore: Clone + Send + Sync {
    /// The last fully processed event, `None` if nothing was processed yet.
    fn get_cursor<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> crate::Result<Option<EventLogIndex>>;
    /// Moves the cursor.
    fn set_cursor<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        cursor: EventLogIndex,
    ) -> crate::Result<()>;
}

/// A buffer of witnessed events ordered by their [`EventLogIndex`].
///
/// Producers append into it, the consumer reads it in order after its cursor.
pub trait EventLogStore<E>: Clone + Send + Sync
where
    E: Serialize + DeserializeOwned,
{
    /// Inserts the events; inserting the same index twice overrides it.
    fn insert_events<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        events: &[(EventLogIndex, E)],
    ) -> crate::Result<()>;
    /// Up to `limit` events strictly after `after` (from the start when `None`), in order.
    fn events_after<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        after: Option<EventLogIndex>,
        limit: usize,
    ) -> crate::Result<Vec<(EventLogIndex, E)>>;
    /// Drops every event up to and including `upto`.
    fn prune_events<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        upto: EventLogIndex,
    ) -> crate::Result<()>;
}

/// Idempotency markers for source chain transactions (`tx-processed:<txhash>`).
pub trait ProcessedTxStore: Clone + Send + Sync {
    /// Marks the transaction as acted upon.
    fn mark_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<()>;
    /// Checks the marker.
    fn is_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<bool>;
    /// Removes the marker.
    fn unmark_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<()>;
}

/// The ordered sequence of transactions broadcast per direction
/// (`pending-submission:<direction>-<index>`).
pub trait SubmissionStore: Clone + Send + Sync {
    /// Appends a new pending submission, the index is allocated atomically.
    fn append_submission(
        &self,
        direction: Direction,
        tx_hash: &str,
    ) -> crate::Result<PendingSubmission>;
    /// Reads a submission by index.
    fn submission(
        &self,
        direction: Direction,
        index: u64,
    ) -> crate::Result<Option<PendingSubmission>>;
    /// Updates the status of a submission.
    fn set_submission_status(
        &self,
        direction: Direction,
        index: u64,
        status: TxStatus,
    ) -> crate::Result<()>;
    /// Number of submissions ever appended, which is also the last index.
    fn submission_count(&self, direction: Direction) -> crate::Result<u64>;
    /// The highest index whose status is resolved, `0` when none is.
    fn status_checked_index(&self, direction: Direction)
        -> crate::Result<u64>;
    /// Moves the resolved watermark.
    fn set_status_checked_index(
        &self,
        direction: Direction,
        index: u64,
    ) -> crate::Result<()>;
    /// All submissions of the direction in index order.
    fn submissions(
        &self,
        direction: Direction,
    ) -> crate::Result<Vec<PendingSubmission>>;
}

/// Persistent state of the prophecy executor.
///
/// Values are opaque to the store and are (de)serialized by the caller's types.
pub trait OracleStore: Clone + Send + Sync {
    /// Reads a prophecy by its oracle id.
    fn get_prophecy<T: DeserializeOwned>(
        &self,
        id: &str,
    ) -> crate::Result<Option<T>>;
    /// Writes a prophecy.
    fn put_prophecy<T: Serialize>(
        &self,
        id: &str,
        prophecy: &T,
    ) -> crate::Result<()>;
    /// Reads the validator set.
    fn get_validators<T: DeserializeOwned>(&self) -> crate::Result<Option<T>>;
    /// Writes the validator set together with its total power, atomically.
    fn put_validators_and_total_power<T: Serialize>(
        &self,
        validators: &T,
        total_power: u64,
    ) -> crate::Result<()>;
    /// Reads the total power of the validator set.
    fn get_total_power(&self) -> crate::Result<Option<u64>>;
    /// Reads the consensus threshold percentage.
    fn get_consensus_threshold(&self) -> crate::Result<Option<u64>>;
    /// Writes the consensus threshold percentage.
    fn put_consensus_threshold(&self, threshold: u64) -> crate::Result<()>;
}

/// Opaque key value pairs grouped by namespace, used by the key manager and
/// the token decimals cache.
pub trait KeyValueStore: Clone + Send + Sync {
    /// Reads a value.
    fn get_value(
        &self,
        namespace: &str,
        key: &[u8],
    ) -> crate::Result<Option<Vec<u8>>>;
    /// Writes a value, overriding the old one.
    fn put_value(
        &self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
    ) -> crate::Result<()>;
    /// Removes a value.
    fn remove_value(&self, namespace: &str, key: &[u8]) -> crate::Result<()>;
    /// Writes all of `entries`, or none of them.
    fn put_values(
        &self,
        namespace: &str,
        entries: &[(Vec<u8>, Vec<u8>)],
    ) -> crate::Result<()>;
}

/// Everything a chain watcher needs from the store.
pub trait WatcherStore<E>:
    HistoryStore + SyncCursorStore + EventLogStore<E> + ProcessedTxStore
where
    E: Serialize + DeserializeOwned,
{
}

impl<S, E> WatcherStore<E> for S
where
    S: HistoryStore + SyncCursorStore + EventLogStore<E> + ProcessedTxStore,
    E: Serialize + DeserializeOwned,
{
}
