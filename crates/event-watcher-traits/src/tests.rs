use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_claim_codec::{ClaimType, WitnessedEvent};
use bridge_relayer_config::event_watcher::EventsWatcherConfig;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::{
    InMemoryStore, ProcessedTxStore, SledStore, SyncCursorStore,
};
use bridge_relayer_types::{ChainKind, EventLogIndex};
use bridge_relayer_utils::Error;
use ethers::types::{H256, U256};
use parking_lot::Mutex;

use crate::mock::MockChainClient;
use crate::watcher::processed_marker;
use crate::{ChainWatcher, EventHandler, WatcherState};

const MATURITY: u64 = 3;

fn context() -> RelayerContext {
    let key =
        "0x4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";
    let config = serde_json::from_value(serde_json::json!({
        "evm": {
            "name": "ganache",
            "http-endpoint": "http://localhost:7545",
            "chain-id": 1337,
            "private-key": key
        },
        "tendermint": {
            "name": "chain33",
            "rpc-endpoint": "http://localhost:8801",
            "chain-id": 33,
            "private-key": key,
            "bridge-exec-address": "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi"
        }
    }))
    .unwrap();
    RelayerContext::new(config, SledStore::temporary().unwrap()).unwrap()
}

fn watcher_config() -> EventsWatcherConfig {
    EventsWatcherConfig {
        polling_interval: 10,
        print_progress_interval: 0,
        max_height_fetch_failures: 3,
        ..Default::default()
    }
}

fn event(nonce: u64) -> WitnessedEvent {
    WitnessedEvent {
        claim_type: ClaimType::Lock,
        tx_hash: H256::from_low_u64_be(nonce),
        sender: "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1".into(),
        receiver: "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi".into(),
        token: String::new(),
        symbol: "eth".into(),
        amount: U256::from(1_000u64),
        nonce,
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventLogIndex, u64)>>,
    attempts: AtomicU32,
    fail_first: u32,
    malformed_nonce: Option<u64>,
}

impl Recorder {
    fn seen(&self) -> Vec<(EventLogIndex, u64)> {
        self.seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl EventHandler for Recorder {
    async fn handle_event(
        &self,
        index: EventLogIndex,
        event: &WitnessedEvent,
    ) -> bridge_relayer_utils::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(Error::Generic("destination unreachable"));
        }
        if self.malformed_nonce == Some(event.nonce) {
            return Err(Error::Decode("bad amount".into()));
        }
        self.seen.lock().push((index, event.nonce));
        Ok(())
    }
}

async fn wait_until(mut f: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn spawn(
    watcher: ChainWatcher<MockChainClient, InMemoryStore>,
    ctx: &RelayerContext,
) -> (
    tokio::sync::watch::Receiver<WatcherState>,
    tokio::task::JoinHandle<bridge_relayer_utils::Result<()>>,
) {
    let state = watcher.subscribe_state();
    let ctx = ctx.clone();
    let handle = tokio::spawn(async move { watcher.run(&ctx).await });
    (state, handle)
}

#[tokio::test]
#[tracing_test::traced_test]
async fn matured_events_should_be_processed_in_order() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Evm, 1337);
    let store = InMemoryStore::default();
    client.push_event(EventLogIndex::new(12, 0), event(3));
    client.push_event(EventLogIndex::new(5, 1), event(2));
    client.push_event(EventLogIndex::new(5, 0), event(1));
    client.push_event(EventLogIndex::new(15, 0), event(4));
    client.set_height(14);
    let recorder = Arc::new(Recorder::default());
    let watcher = ChainWatcher::new(
        Arc::new(client.clone()),
        store.clone(),
        watcher_config(),
        MATURITY,
    )
    .with_handler(recorder.clone());
    let key = watcher.key();
    let (state, handle) = spawn(watcher, &ctx);

    // only the events of height 5 have 3 blocks on top of them.
    wait_until(|| recorder.seen().len() == 2).await;
    assert_eq!(*state.borrow(), WatcherState::Live);
    assert_eq!(store.get_cursor(key).unwrap(), Some(EventLogIndex::new(5, 1)));

    client.set_height(20);
    wait_until(|| recorder.seen().len() == 4).await;
    let nonces: Vec<_> = recorder.seen().into_iter().map(|(_, n)| n).collect();
    assert_eq!(nonces, vec![1, 2, 3, 4]);
    wait_until(|| {
        store.get_cursor(key).unwrap() == Some(EventLogIndex::new(15, 0))
    })
    .await;
    let processed = ctx
        .metrics
        .lock()
        .await
        .events_processed
        .with_label_values(&["evm"])
        .get();
    assert_eq!(processed as u64, 4);

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn processed_events_should_be_skipped() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Tendermint, 33);
    let store = InMemoryStore::default();
    client.push_event(EventLogIndex::new(5, 0), event(1));
    client.push_event(EventLogIndex::new(6, 0), event(2));
    client.push_event(EventLogIndex::new(7, 0), event(3));
    client.fail_tx(event(2).tx_hash);
    client.set_height(20);
    let recorder = Arc::new(Recorder::default());
    let watcher = ChainWatcher::new(
        Arc::new(client),
        store.clone(),
        watcher_config(),
        MATURITY,
    )
    .with_handler(recorder.clone());
    let key = watcher.key();
    store.mark_processed(key, &processed_marker(&event(1))).unwrap();
    let (_state, handle) = spawn(watcher, &ctx);

    wait_until(|| {
        store.get_cursor(key).unwrap() == Some(EventLogIndex::new(7, 0))
    })
    .await;
    // the first was already processed, the second one reverted.
    let nonces: Vec<_> = recorder.seen().into_iter().map(|(_, n)| n).collect();
    assert_eq!(nonces, vec![3]);
    assert!(store.is_processed(key, &processed_marker(&event(2))).unwrap());

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn height_fetch_exhaustion_should_be_fatal() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Evm, 1337);
    client.fail_next_heights(1_000);
    let watcher = ChainWatcher::new(
        Arc::new(client),
        InMemoryStore::default(),
        watcher_config(),
        MATURITY,
    );
    let (_state, handle) = spawn(watcher, &ctx);
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    match result {
        Err(e @ Error::HeightFetchExhausted { attempts, .. }) => {
            assert_eq!(attempts, 3);
            assert!(e.is_fatal());
        }
        other => panic!("unexpected result: {other:?}"),
    }
    let failures = ctx
        .metrics
        .lock()
        .await
        .height_fetch_failures
        .with_label_values(&["evm"])
        .get();
    assert!(failures >= 3.0);
}

#[tokio::test]
async fn malformed_events_should_be_dropped() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Evm, 1337);
    let store = InMemoryStore::default();
    client.push_event(EventLogIndex::new(2, 0), event(1));
    client.push_event(EventLogIndex::new(3, 0), event(2));
    client.set_height(10);
    let recorder = Arc::new(Recorder {
        malformed_nonce: Some(1),
        ..Default::default()
    });
    let watcher = ChainWatcher::new(
        Arc::new(client),
        store.clone(),
        watcher_config(),
        MATURITY,
    )
    .with_handler(recorder.clone());
    let key = watcher.key();
    let (_state, handle) = spawn(watcher, &ctx);

    wait_until(|| {
        store.get_cursor(key).unwrap() == Some(EventLogIndex::new(3, 0))
    })
    .await;
    assert_eq!(recorder.seen(), vec![(EventLogIndex::new(3, 0), 2)]);
    // input errors are never retried.
    assert_eq!(recorder.attempts.load(Ordering::SeqCst), 2);
    assert!(store.is_processed(key, &processed_marker(&event(1))).unwrap());

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn retryable_errors_should_hold_the_cursor() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Evm, 1337);
    let store = InMemoryStore::default();
    client.push_event(EventLogIndex::new(2, 0), event(1));
    client.set_height(10);
    // one attempt plus five retries fail on the first tick.
    let recorder = Arc::new(Recorder {
        fail_first: 8,
        ..Default::default()
    });
    let watcher = ChainWatcher::new(
        Arc::new(client),
        store.clone(),
        watcher_config(),
        MATURITY,
    )
    .with_handler(recorder.clone());
    let key = watcher.key();
    let (_state, handle) = spawn(watcher, &ctx);

    wait_until(|| recorder.attempts.load(Ordering::SeqCst) >= 6).await;
    assert_eq!(store.get_cursor(key).unwrap(), None);
    assert!(!store.is_processed(key, &processed_marker(&event(1))).unwrap());

    wait_until(|| recorder.seen().len() == 1).await;
    assert_eq!(recorder.attempts.load(Ordering::SeqCst), 9);
    wait_until(|| {
        store.get_cursor(key).unwrap() == Some(EventLogIndex::new(2, 0))
    })
    .await;

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn catch_up_should_fetch_in_windows() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Evm, 1337);
    client.set_height(35);
    let watcher = ChainWatcher::new(
        Arc::new(client.clone()),
        InMemoryStore::default(),
        watcher_config(),
        MATURITY,
    );
    let (mut state, handle) = spawn(watcher, &ctx);
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == WatcherState::Live),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(
        client.fetch_ranges()[..4],
        [(1, 10), (11, 20), (21, 30), (31, 35)]
    );

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn start_cursor_should_be_honored() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Tendermint, 33);
    let store = InMemoryStore::default();
    client.push_event(EventLogIndex::new(8, 0), event(1));
    client.push_event(EventLogIndex::new(8, 1), event(2));
    client.push_event(EventLogIndex::new(9, 0), event(3));
    client.set_height(20);
    let config = EventsWatcherConfig {
        start_cursor: Some(bridge_relayer_config::event_watcher::StartCursor {
            height: 8,
            index: 0,
        }),
        ..watcher_config()
    };
    let recorder = Arc::new(Recorder::default());
    let watcher =
        ChainWatcher::new(Arc::new(client.clone()), store, config, MATURITY)
            .with_handler(recorder.clone());
    let (_state, handle) = spawn(watcher, &ctx);

    wait_until(|| recorder.seen().len() == 2).await;
    let nonces: Vec<_> = recorder.seen().into_iter().map(|(_, n)| n).collect();
    assert_eq!(nonces, vec![2, 3]);
    assert_eq!(client.fetch_ranges()[0], (8, 17));

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn subscription_events_should_be_processed() {
    let ctx = context();
    let client = MockChainClient::new(ChainKind::Evm, 1337);
    client.enable_subscription();
    client.set_height(5);
    let recorder = Arc::new(Recorder::default());
    let watcher = ChainWatcher::new(
        Arc::new(client.clone()),
        InMemoryStore::default(),
        watcher_config(),
        MATURITY,
    )
    .with_handler(recorder.clone());
    let (mut state, handle) = spawn(watcher, &ctx);
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == WatcherState::Live),
    )
    .await
    .unwrap()
    .unwrap();

    client.push_live(EventLogIndex::new(8, 0), event(7));
    client.set_height(20);
    wait_until(|| recorder.seen().len() == 1).await;
    assert_eq!(recorder.seen()[0], (EventLogIndex::new(8, 0), 7));
    // nothing is polled while the subscription is open.
    assert_eq!(client.fetch_ranges(), vec![(1, 5)]);

    ctx.shutdown();
    assert!(handle.await.unwrap().is_ok());
}
