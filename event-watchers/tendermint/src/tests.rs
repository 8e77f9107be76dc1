use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use bridge_claim_codec::{Claim, ClaimContent, ClaimType};
use bridge_event_watcher_traits::ChainClient;
use bridge_oracle::{OracleQuery, ProphecyStatus};
use bridge_relayer_context::KeyManager;
use bridge_relayer_store::InMemoryStore;
use bridge_relayer_tx_queue::SubmitClient;
use bridge_relayer_types::private_key::PrivateKey;
use bridge_relayer_types::{ChainKind, EventLogIndex, TxStatus};
use bridge_relayer_utils::Error;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::core::k256::PublicKey;
use ethers::types::{H256, U256};
use parking_lot::Mutex;
use prost::Message;
use serde_json::{json, Value};
use url::Url;

use crate::sign::{
    decode_tx_hex, sign_transaction, signing_hash, RawTransaction, SECP256K1,
};
use crate::{JsonRpcClient, RemoteOracle, TendermintChainClient, TendermintSubmitClient};

const KEY: &str =
    "0x4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";
const ADDRESS: &str = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1";
const RECEIVER: &str = "0x0202020202020202020202020202020202020202";

/// A node answering canned JSON-RPC responses, keyed by method
/// (and by `funcName` for `Chain33.Query`).
#[derive(Default)]
struct MockNode {
    answers: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockNode {
    fn answer(&self, key: &str, result: Value) {
        self.answers
            .lock()
            .insert(key.to_owned(), json!({ "result": result, "error": null }));
    }

    fn fail(&self, key: &str, message: &str) {
        self.answers
            .lock()
            .insert(key.to_owned(), json!({ "result": null, "error": message }));
    }

    fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

async fn handle(
    State(node): State<Arc<MockNode>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default().to_owned();
    let params = request["params"].get(0).cloned().unwrap_or(Value::Null);
    let key = match params["funcName"].as_str() {
        Some(func) if method == "Chain33.Query" => format!("{method}:{func}"),
        _ => method.clone(),
    };
    node.calls.lock().push((method, params));
    let mut response = node
        .answers
        .lock()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| json!({ "result": null, "error": "unknown method" }));
    response["jsonrpc"] = json!("2.0");
    response["id"] = request["id"].clone();
    Json(response)
}

fn spawn_node() -> (Arc<MockNode>, JsonRpcClient) {
    let node = Arc::new(MockNode::default());
    let app = Router::new().route("/", post(handle)).with_state(node.clone());
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service()),
    );
    let endpoint = Url::parse(&format!("http://{addr}/")).unwrap();
    (node, JsonRpcClient::new(endpoint).unwrap())
}

fn tx_hash(byte: u8) -> String {
    format!("{:?}", H256::repeat_byte(byte))
}

fn lock_log(nonce: u64) -> Value {
    json!({
        "tyName": "LogLock",
        "log": {
            "chain33Sender": "1Sender",
            "ethereumReceiver": RECEIVER,
            "symbol": "BTY",
            "amount": "100000000",
            "nonce": nonce
        }
    })
}

fn keys(unlocked: bool) -> KeyManager<InMemoryStore> {
    let configured = HashMap::from([(
        ChainKind::Tendermint,
        PrivateKey::from_hex_str(KEY).unwrap(),
    )]);
    KeyManager::new(InMemoryStore::default(), configured, unlocked)
}

fn burn_claim() -> Claim {
    Claim::new(
        ClaimContent {
            claim_type: ClaimType::Burn,
            source_chain_id: 1337,
            bridge_contract: "0x0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c".into(),
            nonce: 4,
            sender: ADDRESS.into(),
            receiver: "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi".into(),
            token: "0x0303030303030303030303030303030303030303".into(),
            symbol: "bty".into(),
            amount: U256::from(250_000_000u64),
        },
        ADDRESS,
    )
}

#[tokio::test]
async fn latest_height_should_work() {
    let (node, rpc) = spawn_node();
    node.answer("Chain33.GetLastHeader", json!({ "height": 42, "hash": "0x01" }));
    let client = TendermintChainClient::new(rpc, 33);
    assert_eq!(client.kind(), ChainKind::Tendermint);
    assert_eq!(client.latest_height().await.unwrap(), 42);
    assert_eq!(node.params_of("Chain33.GetLastHeader"), vec![Value::Null]);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn fetch_events_should_keep_bridge_logs_only() {
    let (node, rpc) = spawn_node();
    node.answer(
        "Chain33.GetBlocks",
        json!({
            "items": [
                {
                    "block": {
                        "height": 11,
                        "txs": [{ "execer": "x2ethereum", "hash": tx_hash(4) }]
                    },
                    "receipts": [{ "ty": 2, "logs": [lock_log(3)] }]
                },
                {
                    "block": {
                        "height": 10,
                        "txs": [
                            { "execer": "coins", "hash": tx_hash(1) },
                            { "execer": "x2ethereum", "hash": tx_hash(2) },
                            { "execer": "user.p.para.x2ethereum", "hash": tx_hash(3) }
                        ]
                    },
                    "receipts": [
                        { "ty": 2, "logs": [lock_log(99)] },
                        {
                            "ty": 2,
                            "logs": [
                                lock_log(1),
                                { "tyName": "LogFee", "log": {} },
                                { "tyName": "LogChain33ToEthBurn", "log": { "symbol": "bty" } }
                            ]
                        },
                        {
                            "ty": 2,
                            "logs": [{
                                "tyName": "LogChain33ToEthBurn",
                                "log": {
                                    "chain33Sender": "1Sender",
                                    "ethereumReceiver": RECEIVER,
                                    "tokenContract": "0x0303030303030303030303030303030303030303",
                                    "symbol": "USDT",
                                    "amount": "250000000",
                                    "nonce": 2
                                }
                            }]
                        }
                    ]
                }
            ]
        }),
    );
    let client = TendermintChainClient::new(rpc, 33);
    let events = client.fetch_events(10, 11).await.unwrap();

    let indices: Vec<_> = events.iter().map(|(index, _)| *index).collect();
    assert_eq!(
        indices,
        vec![
            EventLogIndex { height: 10, index: 0 },
            EventLogIndex { height: 10, index: 1 },
            EventLogIndex { height: 11, index: 0 },
        ]
    );
    let nonces: Vec<_> = events.iter().map(|(_, e)| e.nonce).collect();
    assert_eq!(nonces, vec![1, 2, 3]);
    assert_eq!(events[1].1.claim_type, ClaimType::Burn);
    assert_eq!(events[1].1.tx_hash, H256::repeat_byte(3));
    assert!(logs_contain("Skipping malformed bridge log"));

    let params = node.params_of("Chain33.GetBlocks");
    assert_eq!(params, vec![json!({ "start": 10, "end": 11, "isDetail": true })]);
}

#[tokio::test]
async fn tx_succeeded_should_read_the_receipt() {
    let (node, rpc) = spawn_node();
    let client = TendermintChainClient::new(rpc, 33);
    node.answer("Chain33.QueryTransaction", json!({ "receipt": { "ty": 2, "logs": [] } }));
    assert!(client.tx_succeeded(H256::repeat_byte(1)).await.unwrap());
    node.answer("Chain33.QueryTransaction", json!({ "receipt": { "ty": 1, "logs": [] } }));
    assert!(!client.tx_succeeded(H256::repeat_byte(1)).await.unwrap());
    // a transaction the node dropped is not retried.
    node.fail("Chain33.QueryTransaction", "ErrTxNotExist");
    assert!(!client.tx_succeeded(H256::repeat_byte(1)).await.unwrap());
    node.fail("Chain33.QueryTransaction", "ErrDBFlush");
    assert!(client.tx_succeeded(H256::repeat_byte(1)).await.is_err());
    assert_eq!(
        node.params_of("Chain33.QueryTransaction")[0],
        json!({ "hash": tx_hash(1) })
    );
}

#[tokio::test]
async fn unexpected_answers_should_be_retried() {
    let (node, rpc) = spawn_node();
    node.answer("Chain33.GetLastHeader", json!({ "height": "tall" }));
    let client = TendermintChainClient::new(rpc, 33);
    let err = client.latest_height().await.unwrap_err();
    assert!(matches!(err, Error::JsonRpc { .. }));
    assert!(!err.is_input_error());
    assert!(!err.is_fatal());

    node.fail("Chain33.GetLastHeader", "ErrNotReady");
    let err = client.latest_height().await.unwrap_err();
    assert!(matches!(err, Error::JsonRpc { ref message, .. } if message == "ErrNotReady"));
}

fn unsigned_tx() -> RawTransaction {
    RawTransaction {
        execer: b"x2ethereum".to_vec(),
        payload: vec![0x0a, 0x0b, 0x0c],
        fee: 1_000,
        nonce: 77,
        to: "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi".into(),
        chain_id: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn broadcast_should_create_sign_and_send() {
    let (node, rpc) = spawn_node();
    let created = unsigned_tx();
    node.answer(
        "Chain33.CreateTransaction",
        json!(format!("0x{}", hex::encode(created.encode_to_vec()))),
    );
    node.answer("Chain33.SendTransaction", json!(tx_hash(0xAB).to_uppercase().replace("0X", "0x")));
    let client = TendermintSubmitClient::new(rpc, keys(true), 100_000);

    assert_eq!(client.account().unwrap(), ADDRESS);
    assert_eq!(client.pending_nonce(ADDRESS).await.unwrap(), None);
    let hash = client.broadcast(&burn_claim(), 0).await.unwrap();
    assert_eq!(hash, tx_hash(0xab));

    let create = &node.params_of("Chain33.CreateTransaction")[0];
    assert_eq!(create["execer"], "x2ethereum");
    assert_eq!(create["actionName"], "Eth2Chain33Burn");
    assert_eq!(create["payload"]["amount"], "250000000");
    assert_eq!(create["payload"]["chain33Receiver"], "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi");
    assert_eq!(create["payload"]["validatorAddress"], ADDRESS);
    assert_eq!(create["payload"]["decimals"], 8);
    // the key is never handed to the node.
    assert!(node.params_of("Chain33.SignRawTx").is_empty());
    assert!(!node.calls.lock().iter().any(|(_, p)| p.to_string().contains(&KEY[2..])));

    let sent = &node.params_of("Chain33.SendTransaction")[0];
    let signed = decode_tx_hex(sent["data"].as_str().unwrap()).unwrap();
    assert_eq!(signed.payload, created.payload);
    assert_eq!(signed.nonce, 77);
    assert_eq!(signed.fee, 100_000);
    let signature = signed.signature.clone().unwrap();
    assert_eq!(signature.ty, SECP256K1);
    let key = PrivateKey::from_hex_str(KEY).unwrap();
    let public = PublicKey::from(
        SigningKey::from_slice(key.as_bytes()).unwrap().verifying_key(),
    );
    assert_eq!(signature.pubkey, public.to_encoded_point(true).as_bytes());
    assert_eq!(signature.signature[0], 0x30);

    // signing is deterministic over the unsigned transaction.
    let mut again = signed.clone();
    again.signature = None;
    sign_transaction(&mut again, &key, 0, signed.expire).unwrap();
    assert_eq!(again, signed);
}

#[test]
fn signing_should_keep_a_higher_fee() {
    let key = PrivateKey::from_hex_str(KEY).unwrap();
    let mut tx = unsigned_tx();
    tx.fee = 500_000;
    let digest = signing_hash(&tx);
    sign_transaction(&mut tx, &key, 100_000, 1_900_000_000).unwrap();
    assert_eq!(tx.fee, 500_000);
    assert_eq!(tx.expire, 1_900_000_000);
    // the signature covers fee and expire but not itself.
    assert_ne!(signing_hash(&tx), digest);
    let mut stripped = tx.clone();
    stripped.signature = None;
    assert_eq!(signing_hash(&tx), signing_hash(&stripped));
}

#[tokio::test]
async fn garbage_transactions_should_not_be_sent() {
    let (node, rpc) = spawn_node();
    node.answer("Chain33.CreateTransaction", json!("zz"));
    let client = TendermintSubmitClient::new(rpc, keys(true), 100_000);
    let err = client.broadcast(&burn_claim(), 0).await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert!(node.params_of("Chain33.SendTransaction").is_empty());
}

#[tokio::test]
async fn locked_keys_should_not_reach_the_node() {
    let (node, rpc) = spawn_node();
    let client = TendermintSubmitClient::new(rpc, keys(false), 100_000);
    let err = client.broadcast(&burn_claim(), 0).await.unwrap_err();
    assert!(matches!(err, Error::KeysLocked));
    assert!(node.calls.lock().is_empty());
}

#[tokio::test]
async fn tx_status_should_work() {
    let (node, rpc) = spawn_node();
    let client = TendermintSubmitClient::new(rpc, keys(true), 100_000);
    let hash = tx_hash(1);

    node.fail("Chain33.QueryTransaction", "tx not exist");
    assert_eq!(client.tx_status(&hash).await.unwrap(), TxStatus::Pending);
    node.answer("Chain33.QueryTransaction", json!({ "receipt": { "ty": 1 } }));
    assert_eq!(client.tx_status(&hash).await.unwrap(), TxStatus::Failed);
    node.answer("Chain33.QueryTransaction", json!({ "receipt": { "ty": 2 } }));
    assert_eq!(client.tx_status(&hash).await.unwrap(), TxStatus::Success);
    node.fail("Chain33.QueryTransaction", "ErrDBFlush");
    assert!(client.tx_status(&hash).await.is_err());
}

#[tokio::test]
async fn remote_oracle_should_work() {
    let (node, rpc) = spawn_node();
    node.answer(
        "Chain33.Query:GetValidators",
        json!({
            "validators": [
                { "address": "0xAA", "power": 80 },
                { "address": "0xbb", "power": 20 }
            ],
            "totalPower": 100
        }),
    );
    node.answer("Chain33.Query:GetTotalPower", json!({ "totalPower": 100 }));
    node.answer("Chain33.Query:GetConsensusThreshold", json!({ "consensusThreshold": 70 }));
    let content = burn_claim().content;
    node.answer(
        "Chain33.Query:GetEthProphecy",
        json!({
            "ID": "1337",
            "status": {
                "text": "SuccessStatusText",
                "finalClaim": serde_json::to_string(&content).unwrap()
            },
            "claimValidators": [
                { "claim": "a", "validators": ["0xBB", "0xaa"] }
            ]
        }),
    );
    let oracle = RemoteOracle::new(rpc);

    let validators = oracle.validators().await.unwrap();
    assert_eq!(validators[0].address, "0xaa");
    assert_eq!(validators[0].power, 80);
    assert_eq!(oracle.total_power().await.unwrap(), 100);
    assert_eq!(oracle.consensus_threshold().await.unwrap(), 70);

    let prophecy = oracle.prophecy("1337").await.unwrap().unwrap();
    assert_eq!(prophecy.status, ProphecyStatus::Success);
    assert_eq!(prophecy.final_claim, Some(content));
    assert_eq!(prophecy.validators, vec!["0xaa".to_owned(), "0xbb".to_owned()]);
    let query = node.params_of("Chain33.Query").pop().unwrap();
    assert_eq!(query["execer"], "x2ethereum");
    assert_eq!(query["payload"], json!({ "ID": "1337" }));

    node.fail("Chain33.Query:GetEthProphecy", "prophecy not found");
    assert_eq!(oracle.prophecy("1337").await.unwrap(), None);
}

#[test]
fn status_text_should_be_parsed() {
    use crate::oracle::parse_status;
    assert_eq!(parse_status(&json!("PendingStatusText")), ProphecyStatus::Pending);
    assert_eq!(parse_status(&json!("FailedStatusText")), ProphecyStatus::Failed);
    assert_eq!(parse_status(&json!("WithdrawedStatusText")), ProphecyStatus::Success);
    assert_eq!(parse_status(&json!(1)), ProphecyStatus::Success);
    assert_eq!(parse_status(&json!(2)), ProphecyStatus::Failed);
    assert_eq!(parse_status(&Value::Null), ProphecyStatus::Pending);
}
