use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use bridge_relayer_types::{
    Direction, EventLogIndex, PendingSubmission, TxStatus,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    EventLogStore, HistoryStore, HistoryStoreKey, KeyValueStore, OracleStore,
    ProcessedTxStore, SubmissionStore, SyncCursorStore,
};

type EventLogs = HashMap<HistoryStoreKey, BTreeMap<EventLogIndex, Vec<u8>>>;

#[derive(Default)]
struct SubmissionLog {
    items: Vec<PendingSubmission>,
    status_checked_index: u64,
}

#[derive(Default)]
struct OracleState {
    prophecies: HashMap<String, Vec<u8>>,
    validators: Option<Vec<u8>>,
    total_power: Option<u64>,
    consensus_threshold: Option<u64>,
}

/// InMemoryStore is a store that keeps the relayer state in memory.
///
/// Values are serialized the same way the sled backend does, so both behave alike.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    last_block_numbers: Arc<RwLock<HashMap<HistoryStoreKey, u64>>>,
    target_block_numbers: Arc<RwLock<HashMap<HistoryStoreKey, u64>>>,
    cursors: Arc<RwLock<HashMap<HistoryStoreKey, EventLogIndex>>>,
    event_logs: Arc<RwLock<EventLogs>>,
    processed: Arc<RwLock<HashSet<(HistoryStoreKey, Vec<u8>)>>>,
    submissions: Arc<RwLock<HashMap<Direction, SubmissionLog>>>,
    oracle: Arc<RwLock<OracleState>>,
    values: Arc<RwLock<HashMap<(String, Vec<u8>), Vec<u8>>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl HistoryStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.last_block_numbers.read();
        let val = guard
            .get(&key.into())
            .cloned()
            .unwrap_or(default_block_number);
        Ok(val)
    }

    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.last_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.target_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.target_block_numbers.read();
        let val = guard
            .get(&key.into())
            .cloned()
            .unwrap_or(default_block_number);
        Ok(val)
    }
}

impl SyncCursorStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn get_cursor<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
    ) -> crate::Result<Option<EventLogIndex>> {
        Ok(self.cursors.read().get(&key.into()).copied())
    }

    #[tracing::instrument(skip(self))]
    fn set_cursor<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        cursor: EventLogIndex,
    ) -> crate::Result<()> {
        self.cursors.write().insert(key.into(), cursor);
        Ok(())
    }
}

impl<E> EventLogStore<E> for InMemoryStore
where
    E: Serialize + DeserializeOwned,
{
    #[tracing::instrument(skip_all, fields(key = ?key, count = events.len()))]
    fn insert_events<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        events: &[(EventLogIndex, E)],
    ) -> crate::Result<()> {
        let encoded = events
            .iter()
            .map(|(idx, e)| Ok((*idx, serde_json::to_vec(e)?)))
            .collect::<crate::Result<Vec<_>>>()?;
        let mut guard = self.event_logs.write();
        guard.entry(key.into()).or_default().extend(encoded);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn events_after<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        after: Option<EventLogIndex>,
        limit: usize,
    ) -> crate::Result<Vec<(EventLogIndex, E)>> {
        let guard = self.event_logs.read();
        let log = match guard.get(&key.into()) {
            Some(log) => log,
            None => return Ok(Vec::new()),
        };
        let range = match after {
            Some(cursor) => log.range((
                std::ops::Bound::Excluded(cursor),
                std::ops::Bound::Unbounded,
            )),
            None => log.range(..),
        };
        range
            .take(limit)
            .map(|(idx, bytes)| Ok((*idx, serde_json::from_slice(bytes)?)))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    fn prune_events<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        upto: EventLogIndex,
    ) -> crate::Result<()> {
        let mut guard = self.event_logs.write();
        if let Some(log) = guard.get_mut(&key.into()) {
            let rest = log.split_off(&EventLogIndex::new(
                upto.height,
                upto.index.saturating_add(1),
            ));
            *log = rest;
        }
        Ok(())
    }
}

impl ProcessedTxStore for InMemoryStore {
    fn mark_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<()> {
        self.processed.write().insert((key.into(), tx_hash.to_vec()));
        Ok(())
    }

    fn is_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<bool> {
        Ok(self
            .processed
            .read()
            .contains(&(key.into(), tx_hash.to_vec())))
    }

    fn unmark_processed<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        tx_hash: &[u8],
    ) -> crate::Result<()> {
        self.processed.write().remove(&(key.into(), tx_hash.to_vec()));
        Ok(())
    }
}

impl SubmissionStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn append_submission(
        &self,
        direction: Direction,
        tx_hash: &str,
    ) -> crate::Result<PendingSubmission> {
        let mut guard = self.submissions.write();
        let log = guard.entry(direction).or_default();
        let submission =
            PendingSubmission::new(log.items.len() as u64 + 1, tx_hash);
        log.items.push(submission.clone());
        Ok(submission)
    }

    fn submission(
        &self,
        direction: Direction,
        index: u64,
    ) -> crate::Result<Option<PendingSubmission>> {
        let guard = self.submissions.read();
        Ok(guard.get(&direction).and_then(|log| {
            index
                .checked_sub(1)
                .and_then(|i| log.items.get(i as usize))
                .cloned()
        }))
    }

    #[tracing::instrument(skip(self))]
    fn set_submission_status(
        &self,
        direction: Direction,
        index: u64,
        status: TxStatus,
    ) -> crate::Result<()> {
        let mut guard = self.submissions.write();
        let item = guard
            .get_mut(&direction)
            .and_then(|log| {
                index
                    .checked_sub(1)
                    .and_then(|i| log.items.get_mut(i as usize))
            })
            .ok_or_else(|| {
                bridge_relayer_utils::Error::InvariantViolation(format!(
                    "no submission {index} for {direction}"
                ))
            })?;
        item.status = status;
        Ok(())
    }

    fn submission_count(&self, direction: Direction) -> crate::Result<u64> {
        let guard = self.submissions.read();
        Ok(guard
            .get(&direction)
            .map(|log| log.items.len() as u64)
            .unwrap_or_default())
    }

    fn status_checked_index(
        &self,
        direction: Direction,
    ) -> crate::Result<u64> {
        let guard = self.submissions.read();
        Ok(guard
            .get(&direction)
            .map(|log| log.status_checked_index)
            .unwrap_or_default())
    }

    fn set_status_checked_index(
        &self,
        direction: Direction,
        index: u64,
    ) -> crate::Result<()> {
        let mut guard = self.submissions.write();
        guard.entry(direction).or_default().status_checked_index = index;
        Ok(())
    }

    fn submissions(
        &self,
        direction: Direction,
    ) -> crate::Result<Vec<PendingSubmission>> {
        let guard = self.submissions.read();
        Ok(guard
            .get(&direction)
            .map(|log| log.items.clone())
            .unwrap_or_default())
    }
}

impl OracleStore for InMemoryStore {
    fn get_prophecy<T: DeserializeOwned>(
        &self,
        id: &str,
    ) -> crate::Result<Option<T>> {
        let guard = self.oracle.read();
        guard
            .prophecies
            .get(id)
            .map(|bytes| serde_json::from_slice(bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn put_prophecy<T: Serialize>(
        &self,
        id: &str,
        prophecy: &T,
    ) -> crate::Result<()> {
        let bytes = serde_json::to_vec(prophecy)?;
        self.oracle.write().prophecies.insert(id.to_owned(), bytes);
        Ok(())
    }

    fn get_validators<T: DeserializeOwned>(&self) -> crate::Result<Option<T>> {
        let guard = self.oracle.read();
        guard
            .validators
            .as_ref()
            .map(|bytes| serde_json::from_slice(bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn put_validators_and_total_power<T: Serialize>(
        &self,
        validators: &T,
        total_power: u64,
    ) -> crate::Result<()> {
        let bytes = serde_json::to_vec(validators)?;
        // one write guard for both values keeps them consistent for readers.
        let mut guard = self.oracle.write();
        guard.validators = Some(bytes);
        guard.total_power = Some(total_power);
        Ok(())
    }

    fn get_total_power(&self) -> crate::Result<Option<u64>> {
        Ok(self.oracle.read().total_power)
    }

    fn get_consensus_threshold(&self) -> crate::Result<Option<u64>> {
        Ok(self.oracle.read().consensus_threshold)
    }

    fn put_consensus_threshold(&self, threshold: u64) -> crate::Result<()> {
        self.oracle.write().consensus_threshold = Some(threshold);
        Ok(())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_value(
        &self,
        namespace: &str,
        key: &[u8],
    ) -> crate::Result<Option<Vec<u8>>> {
        let guard = self.values.read();
        Ok(guard.get(&(namespace.to_owned(), key.to_vec())).cloned())
    }

    fn put_value(
        &self,
        namespace: &str,
        key: &[u8],
        value: &[u8],
    ) -> crate::Result<()> {
        self.values
            .write()
            .insert((namespace.to_owned(), key.to_vec()), value.to_vec());
        Ok(())
    }

    fn remove_value(&self, namespace: &str, key: &[u8]) -> crate::Result<()> {
        self.values
            .write()
            .remove(&(namespace.to_owned(), key.to_vec()));
        Ok(())
    }

    fn put_values(
        &self,
        namespace: &str,
        entries: &[(Vec<u8>, Vec<u8>)],
    ) -> crate::Result<()> {
        let mut guard = self.values.write();
        for (key, value) in entries {
            guard.insert((namespace.to_owned(), key.clone()), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_relayer_types::ChainKind;

    fn key() -> HistoryStoreKey {
        HistoryStoreKey::new(ChainKind::Tendermint, 0)
    }

    #[test]
    fn events_after_cursor_should_work() {
        let store = InMemoryStore::default();
        let events = (0..6u64)
            .map(|h| (EventLogIndex::new(h, 0), format!("event-{h}")))
            .collect::<Vec<_>>();
        store.insert_events(key(), &events).unwrap();
        let batch: Vec<(EventLogIndex, String)> = store
            .events_after(key(), Some(EventLogIndex::new(1, 0)), 3)
            .unwrap();
        assert_eq!(batch, events[2..5].to_vec());
        let empty: Vec<(EventLogIndex, String)> = store
            .events_after(HistoryStoreKey::new(ChainKind::Evm, 0), None, 3)
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn prune_events_should_work() {
        let store = InMemoryStore::default();
        let events = vec![
            (EventLogIndex::new(3, 0), 1u32),
            (EventLogIndex::new(3, 1), 2u32),
            (EventLogIndex::new(4, 0), 3u32),
        ];
        store.insert_events(key(), &events).unwrap();
        EventLogStore::<u32>::prune_events(
            &store,
            key(),
            EventLogIndex::new(3, 1),
        )
        .unwrap();
        let left: Vec<(EventLogIndex, u32)> =
            store.events_after(key(), None, 10).unwrap();
        assert_eq!(left, vec![(EventLogIndex::new(4, 0), 3u32)]);
    }

    #[test]
    fn append_submissions_should_work() {
        let store = InMemoryStore::default();
        let d = Direction::EvmToTendermint;
        for i in 0..3 {
            let s = store.append_submission(d, &format!("0x{i}")).unwrap();
            assert_eq!(s.index, i + 1);
        }
        assert_eq!(store.submission(d, 0).unwrap(), None);
        assert_eq!(store.submission(d, 2).unwrap().unwrap().tx_hash, "0x1");
        store.set_submission_status(d, 3, TxStatus::Failed).unwrap();
        assert_eq!(
            store.submission(d, 3).unwrap().unwrap().status,
            TxStatus::Failed
        );
    }

    #[test]
    fn key_value_namespaces_should_work() {
        let store = InMemoryStore::default();
        store.put_value("decimals", b"evm:0x01", &[18]).unwrap();
        assert_eq!(
            store.get_value("decimals", b"evm:0x01").unwrap(),
            Some(vec![18])
        );
        assert_eq!(store.get_value("keys", b"evm:0x01").unwrap(), None);
        store.remove_value("decimals", b"evm:0x01").unwrap();
        assert_eq!(store.get_value("decimals", b"evm:0x01").unwrap(), None);
    }
}
