//! An in-memory chain used to drive a [`crate::ChainWatcher`] in tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bridge_claim_codec::WitnessedEvent;
use bridge_relayer_types::{ChainKind, EventLogIndex};
use bridge_relayer_utils::Error;
use ethers::types::H256;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::client::{ChainClient, EventStream};

type Item = bridge_relayer_utils::Result<(EventLogIndex, WitnessedEvent)>;

#[derive(Default)]
struct Inner {
    height: u64,
    events: BTreeMap<EventLogIndex, WitnessedEvent>,
    failed_txs: HashSet<H256>,
    height_failures: u32,
    fetch_ranges: Vec<(u64, u64)>,
    subscription: Option<mpsc::UnboundedSender<Item>>,
    subscribable: bool,
}

/// A fake chain whose height and events are set by the test.
#[derive(Clone)]
pub struct MockChainClient {
    kind: ChainKind,
    chain_id: u32,
    inner: Arc<Mutex<Inner>>,
}

impl MockChainClient {
    /// A chain at height zero without events.
    pub fn new(kind: ChainKind, chain_id: u32) -> Self {
        Self {
            kind,
            chain_id,
            inner: Arc::default(),
        }
    }

    /// Moves the head of the chain.
    pub fn set_height(&self, height: u64) {
        self.inner.lock().height = height;
    }

    /// Adds an event that later fetches return.
    pub fn push_event(&self, index: EventLogIndex, event: WitnessedEvent) {
        self.inner.lock().events.insert(index, event);
    }

    /// Adds an event and pushes it to the open subscription, if any.
    pub fn push_live(&self, index: EventLogIndex, event: WitnessedEvent) {
        let mut inner = self.inner.lock();
        inner.height = inner.height.max(index.height);
        inner.events.insert(index, event.clone());
        if let Some(tx) = &inner.subscription {
            let _ = tx.send(Ok((index, event)));
        }
    }

    /// Makes [`ChainClient::tx_succeeded`] answer `false` for `tx_hash`.
    pub fn fail_tx(&self, tx_hash: H256) {
        self.inner.lock().failed_txs.insert(tx_hash);
    }

    /// The next `n` height reads fail.
    pub fn fail_next_heights(&self, n: u32) {
        self.inner.lock().height_failures = n;
    }

    /// Lets [`ChainClient::subscribe`] return a stream.
    pub fn enable_subscription(&self) {
        self.inner.lock().subscribable = true;
    }

    /// Every `(from, to)` range fetched so far.
    pub fn fetch_ranges(&self) -> Vec<(u64, u64)> {
        self.inner.lock().fetch_ranges.clone()
    }
}

#[async_trait::async_trait]
impl ChainClient for MockChainClient {
    fn kind(&self) -> ChainKind {
        self.kind
    }

    fn chain_id(&self) -> u32 {
        self.chain_id
    }

    async fn latest_height(&self) -> bridge_relayer_utils::Result<u64> {
        let mut inner = self.inner.lock();
        if inner.height_failures > 0 {
            inner.height_failures -= 1;
            return Err(Error::Generic("node unreachable"));
        }
        Ok(inner.height)
    }

    async fn fetch_events(
        &self,
        from: u64,
        to: u64,
    ) -> bridge_relayer_utils::Result<Vec<(EventLogIndex, WitnessedEvent)>> {
        let mut inner = self.inner.lock();
        inner.fetch_ranges.push((from, to));
        let events = inner
            .events
            .range(EventLogIndex::new(from, 0)..=EventLogIndex::new(to, u32::MAX))
            .map(|(i, e)| (*i, e.clone()))
            .collect();
        Ok(events)
    }

    async fn subscribe(
        &self,
    ) -> bridge_relayer_utils::Result<Option<EventStream>> {
        let mut inner = self.inner.lock();
        if !inner.subscribable {
            return Ok(None);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscription = Some(tx);
        Ok(Some(UnboundedReceiverStream::new(rx).boxed()))
    }

    async fn tx_succeeded(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(!self.inner.lock().failed_txs.contains(&tx_hash))
    }
}
