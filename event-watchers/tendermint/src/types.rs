//! Wire types of the node answers, as far as the relayer reads them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Receipt type of a transaction that executed successfully.
pub const EXEC_OK: i32 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub height: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocksRequest {
    pub start: u64,
    pub end: u64,
    pub is_detail: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockDetails {
    #[serde(default)]
    pub items: Vec<BlockDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDetail {
    pub block: Block,
    #[serde(default)]
    pub receipts: Vec<Option<Receipt>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub height: u64,
    #[serde(default)]
    pub txs: Vec<Transaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub execer: String,
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    pub ty: i32,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    #[serde(default)]
    pub ty_name: String,
    #[serde(default)]
    pub log: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionDetail {
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTxRequest<'a> {
    pub execer: &'a str,
    pub action_name: &'a str,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub execer: &'a str,
    pub func_name: &'a str,
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorsAnswer {
    #[serde(default)]
    pub validators: Vec<ValidatorAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorAnswer {
    pub address: String,
    pub power: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalPowerAnswer {
    pub total_power: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdAnswer {
    pub consensus_threshold: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProphecyAnswer {
    #[serde(rename = "ID")]
    pub id: String,
    pub status: ProphecyStatusAnswer,
    #[serde(default)]
    pub claim_validators: Vec<ClaimValidatorsAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProphecyStatusAnswer {
    pub text: Value,
    #[serde(default)]
    pub final_claim: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimValidatorsAnswer {
    #[serde(default)]
    pub validators: Vec<String>,
}
