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

use std::fmt::Debug;
use std::path::Path;

use bridge_relayer_types::{
    Direction, EventLogIndex, PendingSubmission, TxStatus,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    EventLogStore, HistoryStore, HistoryStoreKey, KeyValueStore, OracleStore,
    ProcessedTxStore, SubmissionStore, SyncCursorStore,
};

const ORACLE_TREE: &str = "oracle";
const VALIDATOR_SET_KEY: &[u8] = b"validator-set";
const TOTAL_POWER_KEY: &[u8] = b"total-power";
const CONSENSUS_THRESHOLD_KEY: &[u8] = b"consensus-threshold";
const SUBMISSION_TOTAL_KEY: &[u8] = b"total";
const STATUS_CHECKED_INDEX_KEY: &[u8] = b"status-checked-index";

/// SledStore is a store that keeps the relayer state in a [Sled](https://sled.rs)-based database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

fn read_u64(bytes: &[u8]) -> crate::Result<u64> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        bridge_relayer_utils::Error::InvariantViolation(format!(
            "stored counter has {} bytes instead of 8",
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(array))
}

fn submission_item_key(index: u64) -> [u8; 12] {
    // 4 bytes prefix ("item") + 8 bytes of the index.
    let mut key = [0u8; 12];
    key[..4].copy_from_slice(b"item");
    key[4..].copy_from_slice(&index.to_be_bytes());
    key
}

impl SledStore {
    /// Create a new SledStore.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }
    /// Creates a temporary SledStore, removed from disk once dropped.
    pub fn temporary() -> crate::Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// Gets the total amount of data stored on disk
    pub fn get_data_stored_size(&self) -> u64 {
        self.db.size_on_disk().unwrap_or_default()
    }

    fn set_block_number(
        &self,
        tree: &str,
        key: HistoryStoreKey,
        block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree(tree)?;
        let old = tree.insert(key.to_bytes(), &block_number.to_be_bytes())?;
        match old {
            Some(v) => read_u64(&v),
            None => Ok(block_number),
        }
    }

    fn get_block_number(
        &self,
        tree: &str,
        key: HistoryStoreKey,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree(tree)?;
        match tree.get(key.to_bytes())? {
            Some(v) => read_u64(&v),
            None => Ok(default_block_number),
        }
    }

    fn submissions_tree(&self, direction: Direction) -> sled::Result<sled::Tree> {
        self.db
            .open_tree(format!("pending_submission/{}", direction.as_str()))
    }
}

impl HistoryStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        self.set_block_number("last_block_numbers", key.into(), block_number)
    }

    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        self.get_block_number(
            "last_block_numbers",
            key.into(),
            default_block_number,
        )
    }

    #[tracing::instrument(skip(self))]
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        self.set_block_number("target_block_numbers", key.into(), block_number)
    }

    #[tracing::instrument(skip(self))]
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        self.get_block_number(
            "target_block_numbers",
            key.into(),
            default_block_number,
        )
    }
}

impl SyncCursorStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn get_cursor<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> crate::Result<Option<EventLogIndex>> {
        let tree = self.db.open_tree("cursor")?;
        let key: HistoryStoreKey = key.into();
        match tree.get(key.to_bytes())? {
            Some(v) => EventLogIndex::from_bytes(&v).map(Some).ok_or_else(
                || {
                    bridge_relayer_utils::Error::InvariantViolation(format!(
                        "corrupted cursor for {key}"
                    ))
                },
            ),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    fn set_cursor<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        cursor: EventLogIndex,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree("cursor")?;
        let key: HistoryStoreKey = key.into();
        tree.insert(key.to_bytes(), &cursor.to_bytes())?;
        // the cursor is what makes restarts safe, so make sure it hits the disk.
        self.db.flush()?;
        Ok(())
    }
}

impl<E> EventLogStore<E> for SledStore
where
    E: Serialize + DeserializeOwned,
{
    #[tracing::instrument(skip_all, fields(key = ?key, count = events.len()))]
    fn insert_events<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        events: &[(EventLogIndex, E)],
    ) -> crate::Result<()> {
        let key: HistoryStoreKey = key.into();
        let tree = self.db.open_tree(format!("event_log/{key}"))?;
        let mut batch = sled::Batch::default();
        for (idx, event) in events {
            batch.insert(&idx.to_bytes()[..], serde_json::to_vec(event)?);
        }
        tree.apply_batch(batch)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn events_after<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        after: Option<EventLogIndex>,
        limit: usize,
    ) -> crate::Result<Vec<(EventLogIndex, E)>> {
        let key: HistoryStoreKey = key.into();
        let tree = self.db.open_tree(format!("event_log/{key}"))?;
        let iter = match after {
            Some(cursor) => {
                let start = cursor.to_bytes();
                tree.range::<&[u8], _>((
                    std::ops::Bound::Excluded(&start[..]),
                    std::ops::Bound::Unbounded,
                ))
            }
            None => tree.iter(),
        };
        let mut out = Vec::with_capacity(limit);
        for item in iter.take(limit) {
            let (k, v) = item?;
            let idx = EventLogIndex::from_bytes(&k).ok_or_else(|| {
                bridge_relayer_utils::Error::InvariantViolation(format!(
                    "corrupted event log key for {key}"
                ))
            })?;
            out.push((idx, serde_json::from_slice(&v)?));
        }
        Ok(out)
    }

    #[tracing::instrument(skip(self))]
    fn prune_events<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        upto: EventLogIndex,
    ) -> crate::Result<()> {
        let key: HistoryStoreKey = key.into();
        let tree = self.db.open_tree(format!("event_log/{key}"))?;
        let end = upto.to_bytes();
        let mut batch = sled::Batch::default();
        for item in tree.range(..=&end[..]) {
            let (k, _) = item?;
            batch.remove(k);
        }
        tree.apply_batch(batch)?;
        Ok(())
    }
}

impl ProcessedTxStore for SledStore {
    fn mark_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<()> {
        let key: HistoryStoreKey = key.into();
        let tree = self.db.open_tree(format!("tx_processed/{key}"))?;
        tree.insert(tx_hash, b"1")?;
        self.db.flush()?;
        Ok(())
    }

    fn is_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<bool> {
        let key: HistoryStoreKey = key.into();
        let tree = self.db.open_tree(format!("tx_processed/{key}"))?;
        Ok(tree.contains_key(tx_hash)?)
    }

    fn unmark_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<()> {
        let key: HistoryStoreKey = key.into();
        let tree = self.db.open_tree(format!("tx_processed/{key}"))?;
        tree.remove(tx_hash)?;
        Ok(())
    }
}

impl SubmissionStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn append_submission(
        &self,
        direction: Direction,
        tx_hash: &str,
    ) -> crate::Result<PendingSubmission> {
        let tree = self.submissions_tree(direction)?;
        // the index allocation and the item insert happen in one transaction,
        // so a crash can never leave a counter pointing at a missing item.
        let submission =
            tree.transaction::<_, _, std::io::Error>(|db| {
                let last_idx = match db.get(SUBMISSION_TOTAL_KEY)? {
                    Some(v) => {
                        let mut output = [0u8; 8];
                        output.copy_from_slice(&v);
                        u64::from_be_bytes(output)
                    }
                    None => 0u64,
                };
                let index = last_idx + 1;
                let submission = PendingSubmission::new(index, tx_hash);
                let bytes = serde_json::to_vec(&submission).map_err(|e| {
                    sled::transaction::ConflictableTransactionError::Abort(
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                    )
                })?;
                db.insert(SUBMISSION_TOTAL_KEY, &index.to_be_bytes())?;
                db.insert(&submission_item_key(index), bytes)?;
                Ok(submission)
            })?;
        self.db.flush()?;
        tracing::trace!(
            index = submission.index,
            "appended submission for {}",
            direction
        );
        Ok(submission)
    }

    fn submission(
        &self,
        direction: Direction,
        index: u64,
    ) -> crate::Result<Option<PendingSubmission>> {
        let tree = self.submissions_tree(direction)?;
        match tree.get(submission_item_key(index))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    fn set_submission_status(
        &self,
        direction: Direction,
        index: u64,
        status: TxStatus,
    ) -> crate::Result<()> {
        let tree = self.submissions_tree(direction)?;
        let item_key = submission_item_key(index);
        let bytes = tree.get(item_key)?.ok_or_else(|| {
            bridge_relayer_utils::Error::InvariantViolation(format!(
                "no submission {index} for {direction}"
            ))
        })?;
        let mut submission: PendingSubmission = serde_json::from_slice(&bytes)?;
        submission.status = status;
        tree.insert(item_key, serde_json::to_vec(&submission)?)?;
        Ok(())
    }

    fn submission_count(&self, direction: Direction) -> crate::Result<u64> {
        let tree = self.submissions_tree(direction)?;
        match tree.get(SUBMISSION_TOTAL_KEY)? {
            Some(v) => read_u64(&v),
            None => Ok(0),
        }
    }

    fn status_checked_index(
        &self,
        direction: Direction,
    ) -> crate::Result<u64> {
        let tree = self.submissions_tree(direction)?;
        match tree.get(STATUS_CHECKED_INDEX_KEY)? {
            Some(v) => read_u64(&v),
            None => Ok(0),
        }
    }

    fn set_status_checked_index(
        &self,
        direction: Direction,
        index: u64,
    ) -> crate::Result<()> {
        let tree = self.submissions_tree(direction)?;
        tree.insert(STATUS_CHECKED_INDEX_KEY, &index.to_be_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn submissions(
        &self,
        direction: Direction,
    ) -> crate::Result<Vec<PendingSubmission>> {
        let tree = self.submissions_tree(direction)?;
        tree.scan_prefix(b"item")
            .values()
            .map(|v| -> crate::Result<PendingSubmission> {
                Ok(serde_json::from_slice(&v?)?)
            })
            .collect()
    }
}

impl OracleStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn get_prophecy<T: DeserializeOwned>(
        &self,
        id: &str,
    ) -> crate::Result<Option<T>> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        match tree.get(format!("prophecy:{id}"))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, prophecy))]
    fn put_prophecy<T: Serialize>(
        &self,
        id: &str,
        prophecy: &T,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        tree.insert(format!("prophecy:{id}"), serde_json::to_vec(prophecy)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn get_validators<T: DeserializeOwned>(&self) -> crate::Result<Option<T>> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        match tree.get(VALIDATOR_SET_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, validators))]
    fn put_validators_and_total_power<T: Serialize>(
        &self,
        validators: &T,
        total_power: u64,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        let bytes = serde_json::to_vec(validators)?;
        tree.transaction::<_, _, std::io::Error>(|db| {
            db.insert(VALIDATOR_SET_KEY, bytes.as_slice())?;
            db.insert(TOTAL_POWER_KEY, &total_power.to_be_bytes())?;
            Ok(())
        })?;
        self.db.flush()?;
        Ok(())
    }

    fn get_total_power(&self) -> crate::Result<Option<u64>> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        tree.get(TOTAL_POWER_KEY)?
            .map(|v| read_u64(&v))
            .transpose()
    }

    fn get_consensus_threshold(&self) -> crate::Result<Option<u64>> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        tree.get(CONSENSUS_THRESHOLD_KEY)?
            .map(|v| read_u64(&v))
            .transpose()
    }

    fn put_consensus_threshold(&self, threshold: u64) -> crate::Result<()> {
        let tree = self.db.open_tree(ORACLE_TREE)?;
        tree.insert(CONSENSUS_THRESHOLD_KEY, &threshold.to_be_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get_value(
        &self,
        namespace: &str,
        key: &[u8],
    ) -> crate::Result<Option<Vec<u8>>> {
        let tree = self.db.open_tree(format!("kv/{namespace}"))?;
        Ok(tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put_value(
        &self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(format!("kv/{namespace}"))?;
        tree.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove_value(&self, namespace: &str, key: &[u8]) -> crate::Result<()> {
        let tree = self.db.open_tree(format!("kv/{namespace}"))?;
        tree.remove(key)?;
        Ok(())
    }

    fn put_values(
        &self,
        namespace: &str,
        entries: &[(Vec<u8>, Vec<u8>)],
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(format!("kv/{namespace}"))?;
        let mut batch = sled::Batch::default();
        for (key, value) in entries {
            batch.insert(key.as_slice(), value.as_slice());
        }
        tree.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }
}
