use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_claim_codec::{Claim, ClaimContent, ClaimType};
use bridge_relayer_config::TxQueueConfig;
use bridge_relayer_store::{InMemoryStore, SubmissionStore};
use bridge_relayer_types::{Direction, TxStatus};
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::Error;
use ethers::types::U256;
use parking_lot::Mutex;

use crate::{NonceManager, SubmitClient, Submitter, TxStatusTracker};

const ACCOUNT: &str = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1";

#[derive(Default)]
struct MockSubmitClient {
    pending_nonce: Option<u64>,
    nonce_queries: AtomicU32,
    fail_broadcasts: AtomicU32,
    sent: Mutex<Vec<u64>>,
    statuses: Mutex<HashMap<String, TxStatus>>,
    status_queries: Mutex<Vec<String>>,
}

impl MockSubmitClient {
    fn set_status(&self, tx_hash: &str, status: TxStatus) {
        self.statuses.lock().insert(tx_hash.to_owned(), status);
    }
}

#[async_trait::async_trait]
impl SubmitClient for MockSubmitClient {
    fn account(&self) -> bridge_relayer_utils::Result<String> {
        Ok(ACCOUNT.to_owned())
    }

    async fn pending_nonce(
        &self,
        _account: &str,
    ) -> bridge_relayer_utils::Result<Option<u64>> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.pending_nonce)
    }

    async fn broadcast(
        &self,
        _claim: &Claim,
        nonce: u64,
    ) -> bridge_relayer_utils::Result<String> {
        let failing = self.fail_broadcasts.load(Ordering::SeqCst);
        if failing > 0 {
            self.fail_broadcasts.store(failing - 1, Ordering::SeqCst);
            return Err(Error::Generic("connection reset"));
        }
        tokio::task::yield_now().await;
        self.sent.lock().push(nonce);
        Ok(format!("0x{nonce:064x}"))
    }

    async fn tx_status(
        &self,
        tx_hash: &str,
    ) -> bridge_relayer_utils::Result<TxStatus> {
        self.status_queries.lock().push(tx_hash.to_owned());
        Ok(self
            .statuses
            .lock()
            .get(tx_hash)
            .copied()
            .unwrap_or(TxStatus::Pending))
    }
}

fn claim(nonce: u64) -> Claim {
    Claim::new(
        ClaimContent {
            claim_type: ClaimType::Lock,
            source_chain_id: 1337,
            bridge_contract: "0xbridge".into(),
            nonce,
            sender: ACCOUNT.into(),
            receiver: "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi".into(),
            token: String::new(),
            symbol: "eth".into(),
            amount: U256::from(100_000_000u64),
        },
        ACCOUNT,
    )
}

fn submitter(
    client: Arc<MockSubmitClient>,
    store: InMemoryStore,
    config: TxQueueConfig,
) -> (Submitter<MockSubmitClient, InMemoryStore>, Arc<tokio::sync::Mutex<Metrics>>)
{
    let metrics = Arc::new(tokio::sync::Mutex::new(Metrics::new().unwrap()));
    let submitter = Submitter::new(
        Direction::EvmToTendermint,
        client,
        store,
        Arc::new(NonceManager::new()),
        config,
        metrics.clone(),
    );
    (submitter, metrics)
}

#[tokio::test]
async fn nonce_rollback_should_work() {
    let client = Arc::new(MockSubmitClient {
        pending_nonce: Some(5),
        fail_broadcasts: AtomicU32::new(1),
        ..Default::default()
    });
    let store = InMemoryStore::default();
    let (submitter, metrics) =
        submitter(client.clone(), store.clone(), TxQueueConfig::default());

    assert!(submitter.submit(&claim(1)).await.is_err());
    let first = submitter.submit(&claim(1)).await.unwrap();
    let second = submitter.submit(&claim(2)).await.unwrap();
    // the failed broadcast gave nonce 5 back.
    assert_eq!(*client.sent.lock(), vec![5, 6]);
    assert_eq!(client.nonce_queries.load(Ordering::SeqCst), 1);
    assert_eq!(submitter.submitted_tx_hashes().unwrap(), vec![first, second]);
    assert_eq!(store.submission_count(Direction::EvmToTendermint).unwrap(), 2);

    let metrics = metrics.lock().await;
    assert_eq!(metrics.nonce_rollbacks.get() as u64, 1);
    let label = [Direction::EvmToTendermint.as_str()];
    assert_eq!(metrics.submission_failures.with_label_values(&label).get() as u64, 1);
    assert_eq!(metrics.claims_submitted.with_label_values(&label).get() as u64, 2);
}

#[tokio::test]
async fn concurrent_submissions_should_not_leave_gaps() {
    let client = Arc::new(MockSubmitClient::default());
    let (submitter, _) =
        submitter(client.clone(), InMemoryStore::default(), TxQueueConfig::default());
    let tasks = (0..10u64).map(|i| {
        let submitter = submitter.clone();
        tokio::spawn(async move { submitter.submit(&claim(i)).await })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }
    let sent: HashSet<u64> = client.sent.lock().iter().copied().collect();
    assert_eq!(sent, (0..10).collect());
    // an unknown account starts at zero and is queried once.
    assert_eq!(client.nonce_queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_tracker_should_stop_at_first_pending() {
    let client = Arc::new(MockSubmitClient::default());
    let store = InMemoryStore::default();
    let (submitter, _) =
        submitter(client.clone(), store.clone(), TxQueueConfig::default());
    let mut hashes = Vec::new();
    for i in 0..3 {
        hashes.push(submitter.submit(&claim(i)).await.unwrap());
    }
    let tracker = TxStatusTracker::new(
        Direction::EvmToTendermint,
        client.clone(),
        store.clone(),
        Duration::from_millis(10),
        Duration::from_secs(300),
    );

    client.set_status(&hashes[0], TxStatus::Success);
    client.set_status(&hashes[2], TxStatus::Success);
    assert_eq!(tracker.check_once().await.unwrap(), 1);
    // the third one is never asked while the second one is pending.
    assert_eq!(*client.status_queries.lock(), vec![hashes[0].clone(), hashes[1].clone()]);
    let third = store.submission(Direction::EvmToTendermint, 3).unwrap().unwrap();
    assert_eq!(third.status, TxStatus::Pending);

    client.set_status(&hashes[1], TxStatus::Failed);
    assert_eq!(tracker.check_once().await.unwrap(), 3);
    let statuses: Vec<_> = store
        .submissions(Direction::EvmToTendermint)
        .unwrap()
        .into_iter()
        .map(|s| s.status)
        .collect();
    assert_eq!(statuses, vec![TxStatus::Success, TxStatus::Failed, TxStatus::Success]);
    assert_eq!(store.status_checked_index(Direction::EvmToTendermint).unwrap(), 3);
}

#[tokio::test]
async fn wait_for_mined_should_work() {
    let client = Arc::new(MockSubmitClient::default());
    let config = TxQueueConfig {
        wait_mined_timeout: 200,
        wait_mined_poll_interval: 10,
        ..Default::default()
    };
    let (submitter, _) =
        submitter(client.clone(), InMemoryStore::default(), config);
    let tx_hash = submitter.submit(&claim(1)).await.unwrap();

    let result = submitter.wait_for_mined(&tx_hash).await;
    assert!(matches!(result, Err(Error::TxNotMined { .. })));

    let setter = client.clone();
    let hash = tx_hash.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        setter.set_status(&hash, TxStatus::Success);
    });
    assert_eq!(submitter.wait_for_mined(&tx_hash).await.unwrap(), TxStatus::Success);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn unmined_submission_should_fail_after_timeout() {
    let client = Arc::new(MockSubmitClient::default());
    let store = InMemoryStore::default();
    let (submitter, _) =
        submitter(client.clone(), store.clone(), TxQueueConfig::default());
    let first = submitter.submit(&claim(1)).await.unwrap();
    let second = submitter.submit(&claim(2)).await.unwrap();
    client.set_status(&second, TxStatus::Success);
    let tracker = TxStatusTracker::new(
        Direction::EvmToTendermint,
        client.clone(),
        store.clone(),
        Duration::from_millis(10),
        Duration::from_millis(50),
    );

    // young enough to keep waiting for.
    assert_eq!(tracker.check_once().await.unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tracker.check_once().await.unwrap(), 2);

    let first = store.submission(Direction::EvmToTendermint, 1).unwrap().unwrap();
    assert_eq!(first.status, TxStatus::Failed);
    let second = store.submission(Direction::EvmToTendermint, 2).unwrap().unwrap();
    assert_eq!(second.status, TxStatus::Success);
    assert!(logs_contain("Submitted claim not mined in time"));
}
